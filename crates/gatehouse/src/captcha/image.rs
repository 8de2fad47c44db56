//! Challenge payload decoding and click parsing.

use base64::{Engine, engine::general_purpose::STANDARD};

use gatehouse_common::{ClickPoint, GatehouseError};

/// Decode a base64 image payload, with or without a `data:` URL prefix
pub fn decode_image(payload: &str) -> Result<Vec<u8>, GatehouseError> {
    let encoded = match payload.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => payload,
    };

    STANDARD
        .decode(encoded.trim())
        .map_err(|e| GatehouseError::Decode(format!("captcha image: {e}")))
}

/// Parse clicks typed as `x,y x,y ...` (whitespace or `;` between points)
pub fn parse_points(input: &str) -> Result<Vec<ClickPoint>, GatehouseError> {
    input
        .split(|c: char| c.is_whitespace() || c == ';')
        .filter(|s| !s.is_empty())
        .map(|pair| {
            let (x, y) = pair
                .split_once(',')
                .ok_or_else(|| GatehouseError::MissingInput(format!("x,y for point {pair:?}")))?;
            let x = x.trim().parse::<i32>();
            let y = y.trim().parse::<i32>();
            match (x, y) {
                (Ok(x), Ok(y)) => Ok(ClickPoint::new(x, y)),
                _ => Err(GatehouseError::MissingInput(format!(
                    "integer coordinates for point {pair:?}"
                ))),
            }
        })
        .collect()
}
