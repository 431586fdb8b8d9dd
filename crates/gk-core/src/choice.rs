//! Drop-down parameters stored either by name or by list position

use std::fmt::Display;
use std::str::FromStr;

use serde::Deserialize;
use serde::de::{self, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum Stored {
    Position(f64),
    Name(String),
}

/// List position written as a number, e.g. `2` or `2.0`
pub(crate) fn list_position(text: &str) -> Option<Result<usize, ()>> {
    let value = text.trim().parse::<f64>().ok()?;
    Some(if value >= 0.0 && value.fract() == 0.0 {
        Ok(value as usize)
    } else {
        Err(())
    })
}

/// Deserialize a choice saved as its name, its position, or its position as text
pub(crate) fn deserialize_choice<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let text = match Stored::deserialize(deserializer)? {
        Stored::Position(position) => position.to_string(),
        Stored::Name(name) => name,
    };
    text.parse().map_err(de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_position() {
        assert_eq!(list_position("2"), Some(Ok(2)));
        assert_eq!(list_position(" 1.0 "), Some(Ok(1)));
        assert_eq!(list_position("1.5"), Some(Err(())));
        assert_eq!(list_position("-1"), Some(Err(())));
        assert_eq!(list_position("Cone"), None);
    }
}
