//! Target grammar for upgrade, downgrade and stamp.

use std::fmt;
use std::str::FromStr;

/// Where a run should end up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// The unique record without a successor
    Head,
    /// Before the root: nothing applied
    Base,
    /// A full revision id or a unique prefix of one
    Revision(String),
    /// `+N` / `-N` steps from the current marker
    Relative(i64),
}

impl FromStr for Target {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "" => Err("target must not be empty".to_string()),
            "head" | "heads" => Ok(Target::Head),
            "base" => Ok(Target::Base),
            _ if s.starts_with('+') || s.starts_with('-') => {
                let steps: i64 = s
                    .parse()
                    .map_err(|_| format!("invalid relative target '{s}'"))?;
                if steps == 0 {
                    return Err("relative target must not be zero".to_string());
                }
                Ok(Target::Relative(steps))
            }
            _ if s.chars().all(|c| c.is_ascii_alphanumeric()) => {
                Ok(Target::Revision(s.to_string()))
            }
            _ => Err(format!(
                "invalid target '{s}': expected head, base, +N, -N or a revision"
            )),
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Head => write!(f, "head"),
            Target::Base => write!(f, "base"),
            Target::Revision(rev) => write!(f, "{rev}"),
            Target::Relative(n) if *n > 0 => write!(f, "+{n}"),
            Target::Relative(n) => write!(f, "{n}"),
        }
    }
}
