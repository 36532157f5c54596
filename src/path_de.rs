use serde::de::DeserializeOwned;

use crate::error::Error;
use crate::keypath::{Keypath, Segment};

/// Deserialize with keypath context in error messages.
pub fn from_value_with_path<T: DeserializeOwned>(value: &serde_json::Value) -> Result<T, Error> {
    match serde_path_to_error::deserialize::<_, T>(value) {
        Ok(v) => Ok(v),
        Err(err) => {
            let keypath = keypath_of(err.path());
            Err(Error::schema(keypath, err.into_inner().to_string()))
        }
    }
}

fn keypath_of(path: &serde_path_to_error::Path) -> Keypath {
    use serde_path_to_error::Segment as P;
    path.iter()
        .filter_map(|seg| match seg {
            P::Seq { index } => Some(Segment::Index(*index)),
            P::Map { key } => Some(Segment::Key(key.clone())),
            P::Enum { variant } => Some(Segment::Key(variant.clone())),
            P::Unknown => None,
        })
        .collect()
}
