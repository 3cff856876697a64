//! Topic name and topic filter checks applied during decode and encode.

use crate::error::{ProtocolError, Result};

const LEVEL_SEPARATOR: char = '/';
const SINGLE_LEVEL: &str = "+";
const MULTI_LEVEL: &str = "#";

/// A topic name as carried by PUBLISH and the will topic: non-empty and free
/// of wildcard and NUL characters.
pub fn validate_topic_name(topic: &str) -> Result<()> {
    if topic.is_empty() {
        return Err(ProtocolError::InvalidTopic("topic name is empty".into()));
    }
    if topic.contains(['+', '#']) {
        return Err(ProtocolError::InvalidTopic(format!(
            "wildcard in topic name '{topic}'"
        )));
    }
    if topic.contains('\0') {
        return Err(ProtocolError::InvalidTopic("NUL in topic name".into()));
    }
    Ok(())
}

/// A topic filter as carried by SUBSCRIBE and UNSUBSCRIBE.
///
/// `+` must occupy a whole level; `#` must occupy a whole level and be the
/// last one.
pub fn validate_topic_filter(filter: &str) -> Result<()> {
    if filter.is_empty() {
        return Err(ProtocolError::InvalidTopic("topic filter is empty".into()));
    }
    if filter.contains('\0') {
        return Err(ProtocolError::InvalidTopic("NUL in topic filter".into()));
    }

    let mut levels = filter.split(LEVEL_SEPARATOR).peekable();
    while let Some(level) = levels.next() {
        if level.contains('#') && (level != MULTI_LEVEL || levels.peek().is_some()) {
            return Err(ProtocolError::InvalidTopic(format!(
                "misplaced '#' in topic filter '{filter}'"
            )));
        }
        if level.contains('+') && level != SINGLE_LEVEL {
            return Err(ProtocolError::InvalidTopic(format!(
                "misplaced '+' in topic filter '{filter}'"
            )));
        }
    }
    Ok(())
}
