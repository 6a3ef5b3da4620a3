//! Proptest strategies shared by the property tests.

use dispatch_core::status::StatusCode;
use proptest::prelude::*;

/// Capacity inputs, including out-of-range values on both sides.
pub fn capacity_strategy() -> impl Strategy<Value = Option<i64>> {
    prop_oneof![
        3 => Just(None),
        6 => (0i64..=512).prop_map(Some),
        1 => (-1_000i64..0).prop_map(Some),
        1 => ((1i64 << 32)..(1i64 << 40)).prop_map(Some),
    ]
}

/// Status codes a transport may report, success included.
pub fn status_strategy() -> impl Strategy<Value = StatusCode> {
    prop_oneof![
        Just(StatusCode::OK),
        Just(StatusCode::ERR_SERVER),
        Just(StatusCode::ERR_RECORD_NOT_FOUND),
        Just(StatusCode::ERR_RECORD_EXISTS),
        Just(StatusCode::ERR_TIMEOUT),
        Just(StatusCode::ERR_PARAM),
        Just(StatusCode::ERR_CLIENT),
        (-20i32..30).prop_map(StatusCode),
    ]
}

/// Registry actions for capacity conservation checks.
#[derive(Debug, Clone)]
pub enum RegistryAction {
    Create { reads: Option<i64>, writes: Option<i64> },
    Close(usize),
    CloseTwice(usize),
    DestroyAll,
}

pub fn registry_action_strategy() -> impl Strategy<Value = RegistryAction> {
    prop_oneof![
        5 => (capacity_strategy(), capacity_strategy())
            .prop_map(|(reads, writes)| RegistryAction::Create { reads, writes }),
        3 => any::<usize>().prop_map(RegistryAction::Close),
        1 => any::<usize>().prop_map(RegistryAction::CloseTwice),
        1 => Just(RegistryAction::DestroyAll),
    ]
}
