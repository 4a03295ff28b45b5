//! Structured runtime faults (§3, §7).
//!
//! `WenyanFault` is what `嗚呼` raises and `姑妄行此 ... 如事不諧` catches by
//! `name`. It is also what the handful of built-in runtime errors (empty-stack
//! take, unknown name, pipe-call without a pending take) surface as, using
//! the fixed `name = "虛指"` for the empty-stack case per §7.

#[derive(Debug, Clone, PartialEq)]
pub struct WenyanFault {
    pub name: String,
    pub msg: Option<String>,
}

impl WenyanFault {
    pub fn new(name: impl Into<String>) -> Self {
        WenyanFault {
            name: name.into(),
            msg: None,
        }
    }

    pub fn with_msg(name: impl Into<String>, msg: impl Into<String>) -> Self {
        WenyanFault {
            name: name.into(),
            msg: Some(msg.into()),
        }
    }

    /// `name = "虛指"`: the fixed fault raised by taking from an empty
    /// stack (§7).
    pub fn empty_stack() -> Self {
        WenyanFault::new("虛指")
    }
}

impl std::fmt::Display for WenyanFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.msg {
            Some(m) => write!(f, "{}: {}", self.name, m),
            None => write!(f, "{}", self.name),
        }
    }
}

impl std::error::Error for WenyanFault {}
