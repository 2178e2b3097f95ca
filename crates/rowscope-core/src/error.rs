use crate::{NodeId, Phase};

#[derive(Debug)]
pub enum TreeError {
    Missing { id: NodeId },
    TypeMismatch { id: NodeId, expected: &'static str },
    IdentityResolution { node: NodeId },
    InvalidPhase(Phase),
    InputDecode { node: NodeId, message: String },
    Callback(anyhow::Error),
}

impl TreeError {
    /// Folds a callback failure into the domain error. Errors that already
    /// are a [`TreeError`] come back unchanged.
    pub fn from_callback(err: anyhow::Error) -> Self {
        match err.downcast::<TreeError>() {
            Ok(domain) => domain,
            Err(other) => TreeError::Callback(other),
        }
    }
}

impl std::fmt::Display for TreeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TreeError::Missing { id } => write!(f, "node {id} missing"),
            TreeError::TypeMismatch { id, expected } => {
                write!(f, "node {id} type mismatch; expected {expected}")
            }
            TreeError::IdentityResolution { node } => {
                write!(f, "cannot create client id for node {node}: no id vendor and no root")
            }
            TreeError::InvalidPhase(phase) => write!(f, "phase {phase} cannot be processed"),
            TreeError::InputDecode { node, message } => {
                write!(f, "decode failed on node {node}: {message}")
            }
            TreeError::Callback(err) => write!(f, "callback failed: {err}"),
        }
    }
}

impl std::error::Error for TreeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TreeError::Callback(err) => Some(&**err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_pass_through_unchanged() {
        let err = anyhow::Error::new(TreeError::InvalidPhase(Phase::Render));
        let folded = TreeError::from_callback(err);
        assert!(matches!(folded, TreeError::InvalidPhase(Phase::Render)));
    }

    #[test]
    fn foreign_errors_are_wrapped() {
        let folded = TreeError::from_callback(anyhow::anyhow!("boom"));
        match folded {
            TreeError::Callback(inner) => assert_eq!(inner.to_string(), "boom"),
            other => panic!("unexpected error {other}"),
        }
        let display = TreeError::from_callback(anyhow::anyhow!("boom")).to_string();
        assert_eq!(display, "callback failed: boom");
    }
}
