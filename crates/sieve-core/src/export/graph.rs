//! Small builder for ONNX graphs.
//!
//! Nodes, initializers and value infos are appended in call order, so the
//! same sequence of calls always yields the same graph.

use super::onnx::{
    AttributeProto, AttributeType, DataType, GraphProto, NodeProto, TensorProto,
    TensorShapeProto, TypeProto, ValueInfoProto, tensor_shape_proto, type_proto,
};

/// Operator domain for the ONNX-ML operator set.
pub const ML_DOMAIN: &str = "ai.onnx.ml";

/// Operator domain for onnxruntime contrib operators.
pub const MS_DOMAIN: &str = "com.microsoft";

pub fn attr_int(name: &str, value: i64) -> AttributeProto {
    AttributeProto {
        name: Some(name.to_owned()),
        r#type: Some(AttributeType::Int as i32),
        i: Some(value),
        ..Default::default()
    }
}

pub fn attr_ints(name: &str, values: Vec<i64>) -> AttributeProto {
    AttributeProto {
        name: Some(name.to_owned()),
        r#type: Some(AttributeType::Ints as i32),
        ints: values,
        ..Default::default()
    }
}

pub fn attr_string(name: &str, value: &str) -> AttributeProto {
    AttributeProto {
        name: Some(name.to_owned()),
        r#type: Some(AttributeType::String as i32),
        s: Some(value.as_bytes().to_vec()),
        ..Default::default()
    }
}

pub fn attr_strings<S: AsRef<str>>(name: &str, values: &[S]) -> AttributeProto {
    AttributeProto {
        name: Some(name.to_owned()),
        r#type: Some(AttributeType::Strings as i32),
        strings: values.iter().map(|v| v.as_ref().as_bytes().to_vec()).collect(),
        ..Default::default()
    }
}

/// Tensor type with a known rank. Symbolic dims stand for sizes only known
/// at run time.
pub fn tensor_type(elem_type: DataType, dims: &[Dim<'_>]) -> TypeProto {
    let shape = TensorShapeProto {
        dim: dims
            .iter()
            .map(|dim| tensor_shape_proto::Dimension {
                value: Some(match *dim {
                    Dim::Fixed(v) => tensor_shape_proto::dimension::Value::DimValue(v),
                    Dim::Symbolic(p) => {
                        tensor_shape_proto::dimension::Value::DimParam(p.to_owned())
                    }
                }),
                denotation: None,
            })
            .collect(),
    };
    tensor_type_with_shape(elem_type, Some(shape))
}

fn tensor_type_with_shape(elem_type: DataType, shape: Option<TensorShapeProto>) -> TypeProto {
    TypeProto {
        value: Some(type_proto::Value::TensorType(type_proto::Tensor {
            elem_type: Some(elem_type as i32),
            shape,
        })),
        denotation: None,
    }
}

/// `seq(map(key, tensor(value)))`, the ZipMap output type.
pub fn sequence_of_map_type(key: DataType, value: DataType) -> TypeProto {
    let map = TypeProto {
        value: Some(type_proto::Value::MapType(type_proto::Map {
            key_type: Some(key as i32),
            value_type: Some(Box::new(tensor_type_with_shape(value, None))),
        })),
        denotation: None,
    };
    TypeProto {
        value: Some(type_proto::Value::SequenceType(type_proto::Sequence {
            elem_type: Some(Box::new(map)),
        })),
        denotation: None,
    }
}

/// A tensor dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dim<'a> {
    Fixed(i64),
    Symbolic(&'a str),
}

/// Accumulates nodes and initializers for a single graph.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    nodes: Vec<NodeProto>,
    initializers: Vec<TensorProto>,
    inputs: Vec<ValueInfoProto>,
    outputs: Vec<ValueInfoProto>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input(&mut self, name: &str, ty: TypeProto) {
        self.inputs.push(value_info(name, ty));
    }

    pub fn output(&mut self, name: &str, ty: TypeProto) {
        self.outputs.push(value_info(name, ty));
    }

    /// Append a node. Node names must be unique within the graph.
    pub fn node(
        &mut self,
        op_type: &str,
        domain: &str,
        name: &str,
        inputs: &[&str],
        outputs: &[&str],
        attributes: Vec<AttributeProto>,
    ) {
        self.nodes.push(NodeProto {
            input: inputs.iter().map(|s| (*s).to_owned()).collect(),
            output: outputs.iter().map(|s| (*s).to_owned()).collect(),
            name: Some(name.to_owned()),
            op_type: Some(op_type.to_owned()),
            domain: Some(domain.to_owned()),
            attribute: attributes,
            doc_string: None,
        });
    }

    pub fn float_initializer(&mut self, name: &str, dims: Vec<i64>, values: Vec<f32>) {
        self.initializers.push(TensorProto {
            name: Some(name.to_owned()),
            dims,
            data_type: Some(DataType::Float as i32),
            float_data: values,
            ..Default::default()
        });
    }

    pub fn int64_initializer(&mut self, name: &str, dims: Vec<i64>, values: Vec<i64>) {
        self.initializers.push(TensorProto {
            name: Some(name.to_owned()),
            dims,
            data_type: Some(DataType::Int64 as i32),
            int64_data: values,
            ..Default::default()
        });
    }

    pub fn string_initializer<S: AsRef<str>>(&mut self, name: &str, values: &[S]) {
        self.initializers.push(TensorProto {
            name: Some(name.to_owned()),
            dims: vec![values.len() as i64],
            data_type: Some(DataType::String as i32),
            string_data: values.iter().map(|v| v.as_ref().as_bytes().to_vec()).collect(),
            ..Default::default()
        });
    }

    pub fn build(self, name: &str) -> GraphProto {
        GraphProto {
            node: self.nodes,
            name: Some(name.to_owned()),
            initializer: self.initializers,
            doc_string: None,
            input: self.inputs,
            output: self.outputs,
            value_info: Vec::new(),
        }
    }
}

fn value_info(name: &str, ty: TypeProto) -> ValueInfoProto {
    ValueInfoProto {
        name: Some(name.to_owned()),
        r#type: Some(ty),
        doc_string: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nodes_keep_call_order() {
        let mut builder = GraphBuilder::new();
        builder.node("Mul", "", "scale", &["x", "w"], &["y"], vec![]);
        builder.node("Exp", "", "exp", &["y"], &["z"], vec![attr_int("unused", 0)]);
        let graph = builder.build("g");

        let ops: Vec<_> = graph.node.iter().filter_map(|n| n.op_type.as_deref()).collect();
        assert_eq!(ops, ["Mul", "Exp"]);
        assert_eq!(graph.node[0].input, ["x", "w"]);
        assert_eq!(graph.node[1].attribute[0].i, Some(0));
    }

    #[test]
    fn string_initializer_has_length_dim() {
        let mut builder = GraphBuilder::new();
        builder.string_initializer("classes", &["ham", "spam"]);
        let graph = builder.build("g");

        let tensor = &graph.initializer[0];
        assert_eq!(tensor.dims, [2]);
        assert_eq!(tensor.data_type, Some(DataType::String as i32));
        assert_eq!(tensor.string_data, [b"ham".to_vec(), b"spam".to_vec()]);
    }

    #[test]
    fn symbolic_dims_are_params() {
        let ty = tensor_type(DataType::String, &[Dim::Symbolic("N")]);
        let Some(type_proto::Value::TensorType(tensor)) = ty.value else {
            panic!("expected tensor type");
        };
        let dim = &tensor.shape.unwrap().dim[0];
        assert_eq!(
            dim.value,
            Some(tensor_shape_proto::dimension::Value::DimParam("N".into()))
        );
    }
}
