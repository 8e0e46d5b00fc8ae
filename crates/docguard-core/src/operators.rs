//! Mongo-flavored operator vocabulary.
//!
//! The rule engine consults these tables for two things: deciding whether an
//! update payload contains operators (the `merge` consistency check) and
//! stripping operator keys when enumerating the input fields of a query.
//! The vocabulary is kept as data so extending it never touches logic.

/// Operators recognized at the top level of an update payload.
pub const UPDATE_OPERATORS: &[&str] = &[
    "$set", "$inc", "$push", "$pull", "$unset", "$pop", "$mul", "$rename", "$min", "$max",
    "$each",
];

/// Operators recognized inside query documents.
pub const QUERY_OPERATORS: &[&str] = &[
    "$or", "$and", "$not", "$nor", "$in", "$nin", "$eq", "$neq", "$gt", "$gte", "$lt",
    "$lte", "$exists", "$size", "$all", "$regex", "$elemMatch",
];

/// The full operator vocabulary: update and query operators combined.
pub const OPERATORS: &[&[&str]] = &[UPDATE_OPERATORS, QUERY_OPERATORS];

/// Returns `true` if `key` is a recognized update operator.
#[must_use]
pub fn is_update_operator(key: &str) -> bool {
    UPDATE_OPERATORS.contains(&key)
}

/// Returns `true` if `key` is a recognized query operator.
#[must_use]
pub fn is_query_operator(key: &str) -> bool {
    QUERY_OPERATORS.contains(&key)
}

/// Returns `true` if `key` appears anywhere in the operator vocabulary.
#[must_use]
pub fn is_operator(key: &str) -> bool {
    OPERATORS.iter().any(|table| table.contains(&key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_operators() {
        assert!(is_update_operator("$set"));
        assert!(is_update_operator("$rename"));
        assert!(!is_update_operator("$elemMatch"));
        assert!(!is_update_operator("set"));
    }

    #[test]
    fn test_query_operators() {
        assert!(is_query_operator("$or"));
        assert!(is_query_operator("$elemMatch"));
        assert!(!is_query_operator("$set"));
    }

    #[test]
    fn test_combined_vocabulary() {
        assert!(is_operator("$set"));
        assert!(is_operator("$regex"));
        assert!(!is_operator("$lookup"));
        assert!(!is_operator("title"));
    }

    #[test]
    fn test_no_overlap_between_tables() {
        for op in UPDATE_OPERATORS {
            assert!(
                !QUERY_OPERATORS.contains(op),
                "operator {op} appears in both tables"
            );
        }
    }
}
