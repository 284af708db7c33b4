use proptest::prelude::*;
use shelfctl_core::coerce::{coerce, split_values};
use shelfctl_core::{ColumnType, ErrorKind, SchemaRegistry, Value};

fn table_index() -> impl Strategy<Value = usize> {
    0..SchemaRegistry::builtin().all_schemas().len()
}

proptest! {
    /// Property: any value count other than the column count is an arity error
    #[test]
    fn prop_arity_mismatch_for_every_table(
        idx in table_index(),
        values in prop::collection::vec("[a-z0-9-]{0,8}", 0..12),
    ) {
        let schema = &SchemaRegistry::builtin().all_schemas()[idx];
        prop_assume!(values.len() != schema.columns().len());

        let err = coerce(schema, &values).unwrap_err();
        prop_assert_eq!(err.kind(), ErrorKind::ArityMismatch);
    }

    /// Property: well-typed payloads coerce to one field per column, in order
    #[test]
    fn prop_valid_payload_covers_every_column(
        idx in table_index(),
        n in any::<i64>(),
        text in "[A-Za-z ]{1,20}",
        year in 1900i32..2100,
        month in 1u32..=12,
        day in 1u32..=28,
    ) {
        let schema = &SchemaRegistry::builtin().all_schemas()[idx];
        let raw: Vec<String> = schema
            .columns()
            .iter()
            .map(|c| match c.ty {
                ColumnType::Integer => n.to_string(),
                ColumnType::Text => text.clone(),
                ColumnType::Date => format!("{year:04}-{month:02}-{day:02}"),
            })
            .collect();

        let fields = coerce(schema, &raw).unwrap();
        prop_assert_eq!(fields.len(), schema.columns().len());

        let names: Vec<_> = fields.iter().map(|(name, _)| name).collect();
        let expected: Vec<_> = schema.columns().iter().map(|c| c.name).collect();
        prop_assert_eq!(names, expected);

        for (column, (_, value)) in schema.columns().iter().zip(fields.iter()) {
            prop_assert_eq!(value.column_type(), Some(column.ty));
        }
    }

    /// Property: integer columns reject anything that is not a whole number
    #[test]
    fn prop_integer_rejects_non_numeric(word in "[a-z]{1,10}") {
        let user = SchemaRegistry::builtin().resolve("User").unwrap();
        let err = coerce(user, &[word.as_str(), "Ann", "Lee", "a@x.com"]).unwrap_err();
        prop_assert_eq!(err.kind(), ErrorKind::TypeCoercionError);
    }

    /// Property: splitting a joined payload restores the trimmed values
    #[test]
    fn prop_split_roundtrips(values in prop::collection::vec("[a-z0-9]{1,6}", 1..8)) {
        let joined = values.join(" , ");
        prop_assert_eq!(split_values(&joined), values);
    }
}

#[test]
fn integer_text_is_stored_as_integer() {
    let user = SchemaRegistry::builtin().resolve("User").unwrap();
    let fields = coerce(user, &["-3", "Ann", "Lee", "a@x.com"]).unwrap();
    assert_eq!(fields.get("user_id"), Some(&Value::Integer(-3)));
}
