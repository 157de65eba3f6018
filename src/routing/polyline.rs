use geo::{Coord, LineString};

/// Decode a Google-format encoded polyline into a `LineString`.
///
/// `precision` is the coordinate scaling factor; routing services emit 1e5
/// (five decimal places) unless configured otherwise.
///
/// # Errors
/// Returns a message when the string is truncated mid-value or contains
/// bytes outside the encoding alphabet.
pub fn decode(encoded: &str, precision: f64) -> Result<LineString<f64>, String> {
    let bytes = encoded.as_bytes();
    let mut coords = Vec::new();
    let mut index = 0;
    let mut lat = 0i64;
    let mut lon = 0i64;

    while index < bytes.len() {
        let (d_lat, next) = decode_value(bytes, index)?;
        let (d_lon, next) = decode_value(bytes, next)?;
        index = next;

        lat += d_lat;
        lon += d_lon;

        coords.push(Coord {
            x: lon as f64 / precision,
            y: lat as f64 / precision,
        });
    }

    Ok(LineString::new(coords))
}

/// Decode one zigzag-encoded varint starting at `index`; returns the value
/// and the index of the next unread byte.
fn decode_value(bytes: &[u8], mut index: usize) -> Result<(i64, usize), String> {
    let mut result: i64 = 0;
    let mut shift = 0u32;

    loop {
        let byte = *bytes
            .get(index)
            .ok_or_else(|| "polyline truncated mid-value".to_string())?;
        if !(63..=126).contains(&byte) {
            return Err(format!("invalid polyline byte 0x{byte:02x} at {index}"));
        }
        index += 1;

        let chunk = (byte - 63) as i64;
        result |= (chunk & 0x1f) << shift;
        shift += 5;

        if chunk < 0x20 {
            break;
        }
        if shift > 45 {
            return Err("polyline value overflow".to_string());
        }
    }

    let value = if result & 1 != 0 {
        !(result >> 1)
    } else {
        result >> 1
    };
    Ok((value, index))
}
