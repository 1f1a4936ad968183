//! Property-based test generators using proptest.

use hivesync_core::chrono::{DateTime, TimeZone, Utc};
use hivesync_core::{Entity, EntityId, EntityKind, FieldValue, Operation};
use proptest::prelude::*;
use uuid::Uuid;

/// Strategy for generating entity ids.
pub fn entity_id_strategy() -> impl Strategy<Value = EntityId> {
    any::<u128>().prop_map(|n| EntityId::from_uuid(Uuid::from_u128(n)))
}

/// Strategy for generating entity kinds.
pub fn entity_kind_strategy() -> impl Strategy<Value = EntityKind> {
    prop::sample::select(EntityKind::ALL.to_vec())
}

/// Strategy for generating operations.
pub fn operation_strategy() -> impl Strategy<Value = Operation> {
    prop_oneof![
        Just(Operation::Create),
        Just(Operation::Update),
        Just(Operation::Delete),
    ]
}

/// Strategy for timestamps between 2020 and 2030, at millisecond precision.
pub fn timestamp_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    (1_577_836_800_000i64..1_893_456_000_000i64).prop_map(|ms| {
        Utc.timestamp_millis_opt(ms)
            .single()
            .expect("timestamp in range")
    })
}

/// Strategy for field names that are never date fields of any kind.
pub fn field_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-zA-Z]{0,11}")
        .expect("Invalid regex")
        .prop_filter("must not collide with a date or bookkeeping field", |name| {
            name != "id"
                && name != "updatedBy"
                && !EntityKind::ALL.iter().any(|kind| kind.is_date_field(name))
        })
}

/// Strategy for scalar field values that survive a JSON round trip.
pub fn field_value_strategy() -> impl Strategy<Value = FieldValue> {
    prop_oneof![
        Just(FieldValue::Null),
        any::<bool>().prop_map(FieldValue::Bool),
        any::<i64>().prop_map(FieldValue::Integer),
        "[a-zA-Z0-9 äöüß]{0,24}".prop_map(FieldValue::Text),
    ]
}

/// Strategy for live entities of `kind` with a handful of scalar fields.
pub fn entity_strategy(kind: EntityKind) -> impl Strategy<Value = Entity> {
    (
        entity_id_strategy(),
        timestamp_strategy(),
        prop::collection::btree_map(field_name_strategy(), field_value_strategy(), 0..6),
    )
        .prop_map(move |(id, created, fields)| {
            let mut entity = Entity::with_id(id, kind, created);
            entity.fields = fields;
            entity
        })
}

/// Strategy for live entities of any kind.
pub fn any_entity_strategy() -> impl Strategy<Value = Entity> {
    entity_kind_strategy().prop_flat_map(entity_strategy)
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn field_names_avoid_date_fields(name in field_name_strategy()) {
            for kind in EntityKind::ALL {
                prop_assert!(!kind.is_date_field(&name));
            }
        }

        #[test]
        fn generated_entities_are_live(entity in any_entity_strategy()) {
            prop_assert!(entity.is_live());
            prop_assert_eq!(entity.created_at, entity.updated_at);
        }
    }
}
