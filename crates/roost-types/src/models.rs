use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

/// Canonically ordered pair of conversation participants.
///
/// The two ids are stored in ascending byte order, so the pair built from
/// `(a, b)` and the pair built from `(b, a)` are the same value with the
/// same serialized form. Conversation lookup and the uniqueness key both go
/// through this normalization, which is what makes "at most one conversation
/// per pair of users" enforceable at the storage layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "[ObjectId; 2]", into = "[ObjectId; 2]")]
pub struct ParticipantPair([ObjectId; 2]);

impl ParticipantPair {
    /// Build a normalized pair. Returns `None` when both ids name the same
    /// user; a conversation always has two distinct participants.
    pub fn new(a: ObjectId, b: ObjectId) -> Option<Self> {
        if a == b {
            return None;
        }
        Some(if a.bytes() <= b.bytes() {
            Self([a, b])
        } else {
            Self([b, a])
        })
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.0[0] == id || self.0[1] == id
    }

    /// The participant that is not `id`, or `None` when `id` is not a
    /// participant at all.
    pub fn other(&self, id: ObjectId) -> Option<ObjectId> {
        if self.0[0] == id {
            Some(self.0[1])
        } else if self.0[1] == id {
            Some(self.0[0])
        } else {
            None
        }
    }

    /// Scalar form `"<hex low>:<hex high>"`, the value the unique index on
    /// conversations is built over.
    pub fn key(&self) -> String {
        format!("{}:{}", self.0[0].to_hex(), self.0[1].to_hex())
    }

    pub fn ids(&self) -> [ObjectId; 2] {
        self.0
    }
}

impl TryFrom<[ObjectId; 2]> for ParticipantPair {
    type Error = String;

    fn try_from(ids: [ObjectId; 2]) -> Result<Self, Self::Error> {
        Self::new(ids[0], ids[1])
            .ok_or_else(|| "conversation participants must be two distinct users".to_string())
    }
}

impl From<ParticipantPair> for [ObjectId; 2] {
    fn from(pair: ParticipantPair) -> Self {
        pair.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(byte: u8) -> ObjectId {
        ObjectId::from_bytes([byte; 12])
    }

    #[test]
    fn pair_is_order_independent() {
        let (a, b) = (oid(1), oid(2));
        let ab = ParticipantPair::new(a, b).unwrap();
        let ba = ParticipantPair::new(b, a).unwrap();
        assert_eq!(ab, ba);
        assert_eq!(ab.key(), ba.key());
        assert_eq!(ab.ids(), [a, b]);
    }

    #[test]
    fn self_pair_is_rejected() {
        let a = oid(7);
        assert!(ParticipantPair::new(a, a).is_none());
    }

    #[test]
    fn other_returns_the_peer() {
        let (a, b) = (oid(3), oid(9));
        let pair = ParticipantPair::new(a, b).unwrap();
        assert_eq!(pair.other(a), Some(b));
        assert_eq!(pair.other(b), Some(a));
        assert_eq!(pair.other(oid(5)), None);
        assert!(pair.contains(a) && pair.contains(b));
        assert!(!pair.contains(oid(5)));
    }

    #[test]
    fn serializes_as_two_element_array() {
        let pair = ParticipantPair::new(oid(2), oid(1)).unwrap();
        let value = bson::to_bson(&pair).unwrap();
        let array = value.as_array().unwrap();
        assert_eq!(array.len(), 2);
        assert_eq!(array[0].as_object_id(), Some(oid(1)));
        assert_eq!(array[1].as_object_id(), Some(oid(2)));
    }

    #[test]
    fn deserializing_unsorted_array_normalizes() {
        let value = bson::bson!([oid(9), oid(1)]);
        let pair: ParticipantPair = bson::from_bson(value).unwrap();
        assert_eq!(pair.ids(), [oid(1), oid(9)]);
    }

    #[test]
    fn deserializing_equal_ids_fails() {
        let value = bson::bson!([oid(4), oid(4)]);
        assert!(bson::from_bson::<ParticipantPair>(value).is_err());
    }
}
