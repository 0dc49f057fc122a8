use ciborium::Value;
use std::collections::HashMap;

use crate::DecodeError;

const NAME: &str = "name";
const BLENDSHAPES: &str = "blendshapes";
const TRANSFORM: &str = "transform";

/// One datagram's worth of tracking data.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame {
    pub subject_name: String,
    /// Blendshape weights in the order the keys appeared on the wire.
    pub blendshapes: Vec<(String, f32)>,
    /// Raw transform payload, usually a 4x4 matrix. Not applied downstream.
    pub transform: Vec<f32>,
}

impl DecodedFrame {
    pub fn blendshape_names(&self) -> impl Iterator<Item = &str> {
        self.blendshapes.iter().map(|(name, _)| name.as_str())
    }
}

/// Decodes a CBOR map `{name: text, blendshapes: {text: number}, transform: [number]}`.
///
/// Unknown top-level keys are ignored. A repeated blendshape key keeps its
/// first position and takes the last value.
pub fn decode_frame(bytes: &[u8]) -> Result<DecodedFrame, DecodeError> {
    let value: Value =
        ciborium::de::from_reader(bytes).map_err(|e| DecodeError::Cbor(e.to_string()))?;

    let Value::Map(entries) = value else {
        return Err(DecodeError::NotAMap);
    };

    let mut name = None;
    let mut blendshapes = None;
    let mut transform = None;

    for (key, value) in entries {
        match key.as_text() {
            Some(NAME) => name = Some(value),
            Some(BLENDSHAPES) => blendshapes = Some(value),
            Some(TRANSFORM) => transform = Some(value),
            _ => {}
        }
    }

    Ok(DecodedFrame {
        subject_name: subject_name(name)?,
        blendshapes: blendshape_weights(blendshapes)?,
        transform: transform_values(transform)?,
    })
}

fn subject_name(value: Option<Value>) -> Result<String, DecodeError> {
    match value {
        Some(Value::Text(name)) => Ok(name),
        Some(_) => Err(DecodeError::WrongShape {
            field: NAME,
            expected: "text string",
        }),
        None => Err(DecodeError::MissingField { field: NAME }),
    }
}

fn blendshape_weights(value: Option<Value>) -> Result<Vec<(String, f32)>, DecodeError> {
    let wrong_shape = DecodeError::WrongShape {
        field: BLENDSHAPES,
        expected: "map of text string to number",
    };

    let entries = match value {
        Some(Value::Map(entries)) => entries,
        Some(_) => return Err(wrong_shape),
        None => return Err(DecodeError::MissingField { field: BLENDSHAPES }),
    };

    let mut weights: Vec<(String, f32)> = Vec::with_capacity(entries.len());
    let mut positions: HashMap<String, usize> = HashMap::with_capacity(entries.len());
    for (key, value) in entries {
        let (Value::Text(key), Some(weight)) = (key, as_number(&value)) else {
            return Err(wrong_shape);
        };
        match positions.get(&key) {
            Some(&index) => weights[index].1 = weight,
            None => {
                positions.insert(key.clone(), weights.len());
                weights.push((key, weight));
            }
        }
    }
    Ok(weights)
}

fn transform_values(value: Option<Value>) -> Result<Vec<f32>, DecodeError> {
    let wrong_shape = DecodeError::WrongShape {
        field: TRANSFORM,
        expected: "array of numbers",
    };

    match value {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| as_number(item).ok_or_else(|| wrong_shape.clone()))
            .collect(),
        Some(_) => Err(wrong_shape),
        None => Err(DecodeError::MissingField { field: TRANSFORM }),
    }
}

fn as_number(value: &Value) -> Option<f32> {
    match value {
        Value::Float(f) => Some(*f as f32),
        Value::Integer(i) => Some(i128::from(*i) as f32),
        _ => None,
    }
}
