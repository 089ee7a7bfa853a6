//! Window specifications for `OVER (...)`.

use std::{fmt, str::FromStr};

use super::Expr;
use crate::{
    error::{DbError, Result},
    query::OrderTerm,
    traits::IntoExpr,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameMode {
    Range,
    Rows,
    Groups,
}

impl FromStr for FrameMode {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "RANGE" => Ok(FrameMode::Range),
            "ROWS" => Ok(FrameMode::Rows),
            "GROUPS" => Ok(FrameMode::Groups),
            _ => Err(DbError::Window(format!("unknown frame mode `{s}`"))),
        }
    }
}

impl fmt::Display for FrameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FrameMode::Range => "RANGE",
            FrameMode::Rows => "ROWS",
            FrameMode::Groups => "GROUPS",
        })
    }
}

/// One end of a window frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    UnboundedPreceding,
    Preceding(u64),
    CurrentRow,
    Following(u64),
    UnboundedFollowing,
}

impl FromStr for Bound {
    type Err = DbError;

    /// Accepts the snake-case tokens (`unbounded_preceding`, `preceding(2)`,
    /// `current_row`) and the SQL phrases (`2 FOLLOWING`).
    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', " ");
        let err = || DbError::Window(format!("unknown frame bound `{s}`"));

        match normalized.as_str() {
            "unbounded preceding" => return Ok(Bound::UnboundedPreceding),
            "current row" => return Ok(Bound::CurrentRow),
            "unbounded following" => return Ok(Bound::UnboundedFollowing),
            _ => {}
        }

        let (word, offset) = if let Some(rest) = normalized.strip_suffix(')') {
            let (word, offset) = rest.split_once('(').ok_or_else(err)?;
            (word.trim(), offset.trim())
        } else {
            let (offset, word) = normalized.split_once(' ').ok_or_else(err)?;
            (word.trim(), offset.trim())
        };
        let offset: u64 = offset.parse().map_err(|_| err())?;

        match word {
            "preceding" => Ok(Bound::Preceding(offset)),
            "following" => Ok(Bound::Following(offset)),
            _ => Err(err()),
        }
    }
}

impl fmt::Display for Bound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bound::UnboundedPreceding => f.write_str("UNBOUNDED PRECEDING"),
            Bound::Preceding(n) => write!(f, "{n} PRECEDING"),
            Bound::CurrentRow => f.write_str("CURRENT ROW"),
            Bound::Following(n) => write!(f, "{n} FOLLOWING"),
            Bound::UnboundedFollowing => f.write_str("UNBOUNDED FOLLOWING"),
        }
    }
}

/// A frame clause such as `ROWS BETWEEN 1 PRECEDING AND CURRENT ROW`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub mode: FrameMode,
    pub start: Bound,
    pub end: Option<Bound>,
}

impl Frame {
    /// A frame starting at `UNBOUNDED PRECEDING`; narrow it with
    /// [`Frame::between`] or [`Frame::starting`].
    pub fn new(mode: FrameMode) -> Self {
        Self {
            mode,
            start: Bound::UnboundedPreceding,
            end: None,
        }
    }

    pub fn range() -> Self {
        Self::new(FrameMode::Range)
    }

    pub fn rows() -> Self {
        Self::new(FrameMode::Rows)
    }

    pub fn groups() -> Self {
        Self::new(FrameMode::Groups)
    }

    pub fn between(self, start: Bound, end: Bound) -> Self {
        Self {
            start,
            end: Some(end),
            ..self
        }
    }

    pub fn starting(self, start: Bound) -> Self {
        Self {
            start,
            end: None,
            ..self
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.start == Bound::UnboundedFollowing {
            return Err(DbError::Window(
                "a frame cannot start at UNBOUNDED FOLLOWING".into(),
            ));
        }
        if self.end == Some(Bound::UnboundedPreceding) {
            return Err(DbError::Window(
                "a frame cannot end at UNBOUNDED PRECEDING".into(),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.end {
            Some(end) => write!(f, "{} BETWEEN {} AND {end}", self.mode, self.start),
            None => write!(f, "{} {}", self.mode, self.start),
        }
    }
}

/// An inline window specification.
#[derive(Debug, Clone, Default)]
pub struct Window {
    pub partition_by: Vec<Expr>,
    pub order_by: Vec<OrderTerm>,
    pub frame: Option<Frame>,
}

impl Window {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn partition_by<I, E>(mut self, exprs: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: IntoExpr,
    {
        self.partition_by
            .extend(exprs.into_iter().map(IntoExpr::into_expr));
        self
    }

    pub fn order_by<I, O>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = O>,
        O: Into<OrderTerm>,
    {
        self.order_by.extend(terms.into_iter().map(Into::into));
        self
    }

    pub fn frame(mut self, frame: Frame) -> Self {
        self.frame = Some(frame);
        self
    }
}

/// A named window declared in a SELECT's `WINDOW` clause.
#[derive(Debug, Clone)]
pub struct WindowDef {
    pub name: String,
    pub window: Window,
}

impl WindowDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            window: Window::default(),
        }
    }

    pub fn partition_by<I, E>(self, exprs: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: IntoExpr,
    {
        Self {
            window: self.window.partition_by(exprs),
            ..self
        }
    }

    pub fn order_by<I, O>(self, terms: I) -> Self
    where
        I: IntoIterator<Item = O>,
        O: Into<OrderTerm>,
    {
        Self {
            window: self.window.order_by(terms),
            ..self
        }
    }

    pub fn frame(self, frame: Frame) -> Self {
        Self {
            window: self.window.frame(frame),
            ..self
        }
    }
}

/// The target of `OVER`.
#[derive(Debug, Clone)]
pub enum Over {
    Inline(Window),
    Named(String),
}

impl From<Window> for Over {
    fn from(window: Window) -> Self {
        Over::Inline(window)
    }
}

impl From<&WindowDef> for Over {
    fn from(def: &WindowDef) -> Self {
        Over::Named(def.name.clone())
    }
}

impl From<&str> for Over {
    fn from(name: &str) -> Self {
        Over::Named(name.to_string())
    }
}
