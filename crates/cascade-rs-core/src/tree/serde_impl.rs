//! serde bridge so any serde format can produce or consume a tree.

use super::{Scalar, TreeNode};
use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use std::collections::BTreeMap;
use std::fmt;

impl Serialize for TreeNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TreeNode::Null => serializer.serialize_unit(),
            TreeNode::Scalar(scalar) => scalar.serialize(serializer),
            TreeNode::List(list) => {
                let mut seq = serializer.serialize_seq(Some(list.len()))?;
                for element in list {
                    seq.serialize_element(element)?;
                }
                seq.end()
            }
            TreeNode::Map(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in map {
                    out.serialize_entry(key, value)?;
                }
                out.end()
            }
        }
    }
}

impl Serialize for Scalar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Scalar::String(value) => serializer.serialize_str(value),
            Scalar::Integer(value) => serializer.serialize_i64(*value),
            Scalar::Unsigned(value) => serializer.serialize_u64(*value),
            Scalar::Float(value) => serializer.serialize_f64(*value),
            Scalar::Bool(value) => serializer.serialize_bool(*value),
        }
    }
}

impl<'de> Deserialize<'de> for TreeNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(TreeNodeVisitor)
    }
}

struct TreeNodeVisitor;

impl<'de> Visitor<'de> for TreeNodeVisitor {
    type Value = TreeNode;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("any configuration value")
    }

    fn visit_bool<E: de::Error>(self, value: bool) -> Result<TreeNode, E> {
        Ok(TreeNode::Scalar(Scalar::Bool(value)))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<TreeNode, E> {
        Ok(TreeNode::Scalar(Scalar::Integer(value)))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<TreeNode, E> {
        Ok(match i64::try_from(value) {
            Ok(value) => TreeNode::Scalar(Scalar::Integer(value)),
            Err(_) => TreeNode::Scalar(Scalar::Unsigned(value)),
        })
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<TreeNode, E> {
        Ok(TreeNode::Scalar(Scalar::Float(value)))
    }

    fn visit_char<E: de::Error>(self, value: char) -> Result<TreeNode, E> {
        Ok(TreeNode::string(value.to_string()))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<TreeNode, E> {
        Ok(TreeNode::string(value))
    }

    fn visit_string<E: de::Error>(self, value: String) -> Result<TreeNode, E> {
        Ok(TreeNode::string(value))
    }

    fn visit_none<E: de::Error>(self) -> Result<TreeNode, E> {
        Ok(TreeNode::Null)
    }

    fn visit_unit<E: de::Error>(self) -> Result<TreeNode, E> {
        Ok(TreeNode::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<TreeNode, D::Error> {
        TreeNode::deserialize(deserializer)
    }

    fn visit_newtype_struct<D: Deserializer<'de>>(
        self,
        deserializer: D,
    ) -> Result<TreeNode, D::Error> {
        TreeNode::deserialize(deserializer)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<TreeNode, A::Error> {
        let mut list = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(element) = seq.next_element::<TreeNode>()? {
            list.push(element);
        }
        Ok(TreeNode::List(list))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<TreeNode, A::Error> {
        let mut map = BTreeMap::new();
        while let Some(MapKey(key)) = access.next_key::<MapKey>()? {
            let value = access.next_value::<TreeNode>()?;
            map.insert(key, value);
        }
        Ok(TreeNode::Map(map))
    }
}

/// Map key accepting any scalar, since YAML allows non-string keys.
struct MapKey(String);

impl<'de> Deserialize<'de> for MapKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(MapKeyVisitor)
    }
}

struct MapKeyVisitor;

impl<'de> Visitor<'de> for MapKeyVisitor {
    type Value = MapKey;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a scalar map key")
    }

    fn visit_bool<E: de::Error>(self, value: bool) -> Result<MapKey, E> {
        Ok(MapKey(value.to_string()))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<MapKey, E> {
        Ok(MapKey(value.to_string()))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<MapKey, E> {
        Ok(MapKey(value.to_string()))
    }

    fn visit_f64<E: de::Error>(self, value: f64) -> Result<MapKey, E> {
        Ok(MapKey(value.to_string()))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<MapKey, E> {
        Ok(MapKey(value.to_string()))
    }

    fn visit_string<E: de::Error>(self, value: String) -> Result<MapKey, E> {
        Ok(MapKey(value))
    }
}
