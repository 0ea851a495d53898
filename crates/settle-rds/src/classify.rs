//! Fault codes and per-call-site classifiers
//!
//! The same fault is classified differently depending on who asks. A global
//! cluster that "is upgrading" is a lock worth waiting on when modifying the
//! global cluster, but when it comes back from a member modification it is an
//! ordering signal the orchestrator has to see, so the member classifier must
//! not swallow it in retries.

use settle_core::{ErrorClass, RemoteError, RuleClassifier};

pub const ERR_INVALID_PARAMETER_VALUE: &str = "InvalidParameterValue";
pub const ERR_INVALID_CLUSTER_STATE: &str = "InvalidDBClusterStateFault";
pub const ERR_INVALID_GLOBAL_CLUSTER_STATE: &str = "InvalidGlobalClusterStateFault";
pub const ERR_CLUSTER_NOT_FOUND: &str = "DBClusterNotFoundFault";
pub const ERR_GLOBAL_CLUSTER_NOT_FOUND: &str = "GlobalClusterNotFoundFault";
pub const ERR_THROTTLING: &str = "Throttling";

/// ModifyGlobalCluster rejects minor version changes with this message
pub const MSG_MAJOR_ONLY: &str = "only supports Major Version Upgrades";
/// A member cannot be upgraded before the other members
pub const MSG_REPLICAS_FIRST: &str = "upgrade global replicas first";
/// The global cluster is in the middle of another upgrade
pub const MSG_IS_UPGRADING: &str = "is upgrading";
pub const MSG_NO_PRIMARY: &str = "Cannot modify engine version without a primary instance";
pub const MSG_IAM_ROLE_PROPAGATION: &str = "IAM role ARN value is invalid";

/// Classifier for describe calls made by the waiters
pub fn describe_classifier() -> RuleClassifier {
    RuleClassifier::new(ErrorClass::Fatal)
        .code(ERR_CLUSTER_NOT_FOUND, ErrorClass::NotFound)
        .code(ERR_GLOBAL_CLUSTER_NOT_FOUND, ErrorClass::NotFound)
}

/// Classifier for the major-version ModifyGlobalCluster call
pub fn global_modify_classifier() -> RuleClassifier {
    RuleClassifier::new(ErrorClass::Fatal)
        .message(ERR_INVALID_PARAMETER_VALUE, MSG_MAJOR_ONLY, ErrorClass::Fatal)
        .code(ERR_INVALID_GLOBAL_CLUSTER_STATE, ErrorClass::Transient)
        .code(ERR_GLOBAL_CLUSTER_NOT_FOUND, ErrorClass::NotFound)
        .code(ERR_THROTTLING, ErrorClass::Transient)
}

/// Classifier for the per-member ModifyCluster call of a minor upgrade
pub fn member_modify_classifier() -> RuleClassifier {
    RuleClassifier::new(ErrorClass::Fatal)
        .message(
            ERR_INVALID_PARAMETER_VALUE,
            MSG_IAM_ROLE_PROPAGATION,
            ErrorClass::Transient,
        )
        .message(ERR_INVALID_CLUSTER_STATE, MSG_NO_PRIMARY, ErrorClass::Fatal)
        .message(ERR_INVALID_PARAMETER_VALUE, MSG_REPLICAS_FIRST, ErrorClass::Fatal)
        .message(ERR_INVALID_PARAMETER_VALUE, MSG_IS_UPGRADING, ErrorClass::Fatal)
        .message(ERR_INVALID_CLUSTER_STATE, MSG_IS_UPGRADING, ErrorClass::Fatal)
        .message(
            ERR_INVALID_GLOBAL_CLUSTER_STATE,
            MSG_IS_UPGRADING,
            ErrorClass::Fatal,
        )
        .code(ERR_INVALID_CLUSTER_STATE, ErrorClass::Transient)
        .code(ERR_CLUSTER_NOT_FOUND, ErrorClass::NotFound)
        .code(ERR_THROTTLING, ErrorClass::Transient)
}

/// The major attempt was refused because the change is a minor one
pub fn is_major_only_signal(err: &RemoteError) -> bool {
    err.message_contains(ERR_INVALID_PARAMETER_VALUE, MSG_MAJOR_ONLY)
}

/// A member modification was refused because of cross-member ordering
pub fn is_ordering_signal(err: &RemoteError) -> bool {
    [
        ERR_INVALID_PARAMETER_VALUE,
        ERR_INVALID_CLUSTER_STATE,
        ERR_INVALID_GLOBAL_CLUSTER_STATE,
    ]
    .iter()
    .any(|code| {
        err.message_contains(code, MSG_REPLICAS_FIRST) || err.message_contains(code, MSG_IS_UPGRADING)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use settle_core::Classifier;

    fn err(code: &str, message: &str) -> RemoteError {
        RemoteError::new(code, message)
    }

    #[test]
    fn test_is_upgrading_depends_on_call_site() {
        let locked = err(
            ERR_INVALID_GLOBAL_CLUSTER_STATE,
            "Global cluster orders is upgrading",
        );
        assert_eq!(
            global_modify_classifier().classify(&locked),
            ErrorClass::Transient
        );

        let member_blocked = err(
            ERR_INVALID_PARAMETER_VALUE,
            "Global cluster orders is upgrading",
        );
        assert_eq!(
            member_modify_classifier().classify(&member_blocked),
            ErrorClass::Fatal
        );
        assert!(is_ordering_signal(&member_blocked));

        // A member modify can also see the global lock fault itself.
        assert_eq!(
            member_modify_classifier().classify(&locked),
            ErrorClass::Fatal
        );
        assert!(is_ordering_signal(&locked));
        assert!(!is_ordering_signal(&err(
            ERR_INVALID_GLOBAL_CLUSTER_STATE,
            "Global cluster orders is modifying"
        )));
    }

    #[test]
    fn test_member_classifier() {
        let classifier = member_modify_classifier();

        assert_eq!(
            classifier.classify(&err(
                ERR_INVALID_CLUSTER_STATE,
                "DB cluster is not available for modification"
            )),
            ErrorClass::Transient
        );
        assert_eq!(
            classifier.classify(&err(
                ERR_INVALID_CLUSTER_STATE,
                "Cannot modify engine version without a primary instance in DB cluster"
            )),
            ErrorClass::Fatal
        );
        assert_eq!(
            classifier.classify(&err(
                ERR_INVALID_PARAMETER_VALUE,
                "IAM role ARN value is invalid or does not include the required permissions"
            )),
            ErrorClass::Transient
        );
        assert_eq!(
            classifier.classify(&err(ERR_CLUSTER_NOT_FOUND, "")),
            ErrorClass::NotFound
        );
        assert_eq!(
            classifier.classify(&err("AccessDenied", "")),
            ErrorClass::Fatal
        );
    }

    #[test]
    fn test_signals() {
        let fallback = err(
            ERR_INVALID_PARAMETER_VALUE,
            "ModifyGlobalCluster only supports Major Version Upgrades.",
        );
        assert!(is_major_only_signal(&fallback));
        assert!(!is_ordering_signal(&fallback));
        assert_eq!(
            global_modify_classifier().classify(&fallback),
            ErrorClass::Fatal
        );

        let replicas = err(
            ERR_INVALID_PARAMETER_VALUE,
            "Unable to upgrade DB cluster orders-primary: upgrade global replicas first",
        );
        assert!(is_ordering_signal(&replicas));
        assert!(!is_major_only_signal(&replicas));
    }
}
