//! Protocol buffer messages for the TensorFlow `GraphDef` format
//!
//! Only the fields the inspector reads are declared; everything else on the
//! wire is skipped by the decoder. Field numbers follow
//! `tensorflow/core/framework/*.proto`.

pub mod tensorflow {
    use std::collections::HashMap;

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct GraphDef {
        #[prost(message, repeated, tag = "1")]
        pub node: Vec<NodeDef>,
        #[prost(message, optional, tag = "4")]
        pub versions: Option<VersionDef>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct NodeDef {
        #[prost(string, tag = "1")]
        pub name: String,
        #[prost(string, tag = "2")]
        pub op: String,
        /// `"node"`, `"node:slot"` or `"^node"` for control dependencies.
        #[prost(string, repeated, tag = "3")]
        pub input: Vec<String>,
        #[prost(string, tag = "4")]
        pub device: String,
        #[prost(map = "string, message", tag = "5")]
        pub attr: HashMap<String, AttrValue>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct VersionDef {
        #[prost(int32, tag = "1")]
        pub producer: i32,
        #[prost(int32, tag = "2")]
        pub min_consumer: i32,
        #[prost(int32, repeated, tag = "3")]
        pub bad_consumers: Vec<i32>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct AttrValue {
        #[prost(oneof = "attr_value::Value", tags = "2, 3, 4, 5, 6, 7, 8, 1, 9")]
        pub value: Option<attr_value::Value>,
    }

    pub mod attr_value {
        /// Only the list kinds an op signature can draw on; string, int, float
        /// and bool lists are skipped.
        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct ListValue {
            #[prost(int32, repeated, tag = "6")]
            pub r#type: Vec<i32>,
            #[prost(message, repeated, tag = "7")]
            pub shape: Vec<super::TensorShapeProto>,
            #[prost(message, repeated, tag = "8")]
            pub tensor: Vec<super::TensorProto>,
        }

        #[derive(Clone, PartialEq, ::prost::Oneof)]
        pub enum Value {
            #[prost(bytes, tag = "2")]
            S(Vec<u8>),
            #[prost(int64, tag = "3")]
            I(i64),
            #[prost(float, tag = "4")]
            F(f32),
            #[prost(bool, tag = "5")]
            B(bool),
            #[prost(int32, tag = "6")]
            Type(i32),
            #[prost(message, tag = "7")]
            Shape(super::TensorShapeProto),
            #[prost(message, tag = "8")]
            Tensor(super::TensorProto),
            #[prost(message, tag = "1")]
            List(ListValue),
            #[prost(string, tag = "9")]
            Placeholder(String),
        }
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct TensorProto {
        #[prost(int32, tag = "1")]
        pub dtype: i32,
        #[prost(message, optional, tag = "2")]
        pub tensor_shape: Option<TensorShapeProto>,
        #[prost(int32, tag = "3")]
        pub version_number: i32,
        #[prost(bytes = "vec", tag = "4")]
        pub tensor_content: Vec<u8>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct TensorShapeProto {
        #[prost(message, repeated, tag = "2")]
        pub dim: Vec<tensor_shape_proto::Dim>,
        #[prost(bool, tag = "3")]
        pub unknown_rank: bool,
    }

    pub mod tensor_shape_proto {
        #[derive(Clone, PartialEq, ::prost::Message)]
        pub struct Dim {
            /// `-1` marks a dimension of unknown size.
            #[prost(int64, tag = "1")]
            pub size: i64,
            #[prost(string, tag = "2")]
            pub name: String,
        }
    }

    impl TensorShapeProto {
        pub fn from_dims(dims: &[i64]) -> Self {
            TensorShapeProto {
                dim: dims
                    .iter()
                    .map(|&size| tensor_shape_proto::Dim {
                        size,
                        ..Default::default()
                    })
                    .collect(),
                unknown_rank: false,
            }
        }

        pub fn unknown() -> Self {
            TensorShapeProto {
                dim: Vec::new(),
                unknown_rank: true,
            }
        }
    }

    impl AttrValue {
        pub fn of(value: attr_value::Value) -> Self {
            AttrValue { value: Some(value) }
        }
    }

    impl NodeDef {
        fn attr_value(&self, name: &str) -> Option<&attr_value::Value> {
            self.attr.get(name).and_then(|attr| attr.value.as_ref())
        }

        pub fn attr_type(&self, name: &str) -> Option<i32> {
            match self.attr_value(name)? {
                attr_value::Value::Type(tag) => Some(*tag),
                _ => None,
            }
        }

        pub fn attr_int(&self, name: &str) -> Option<i64> {
            match self.attr_value(name)? {
                attr_value::Value::I(value) => Some(*value),
                _ => None,
            }
        }

        pub fn attr_bool(&self, name: &str) -> Option<bool> {
            match self.attr_value(name)? {
                attr_value::Value::B(value) => Some(*value),
                _ => None,
            }
        }

        pub fn attr_shape(&self, name: &str) -> Option<&TensorShapeProto> {
            match self.attr_value(name)? {
                attr_value::Value::Shape(shape) => Some(shape),
                _ => None,
            }
        }

        pub fn attr_tensor(&self, name: &str) -> Option<&TensorProto> {
            match self.attr_value(name)? {
                attr_value::Value::Tensor(tensor) => Some(tensor),
                _ => None,
            }
        }

        pub fn attr_type_list(&self, name: &str) -> Option<&[i32]> {
            match self.attr_value(name)? {
                attr_value::Value::List(list) => Some(&list.r#type),
                _ => None,
            }
        }

        pub fn attr_shape_list(&self, name: &str) -> Option<&[TensorShapeProto]> {
            match self.attr_value(name)? {
                attr_value::Value::List(list) => Some(&list.shape),
                _ => None,
            }
        }
    }
}
