//! Maidenhead locator derivation and message token substitution

/// Compute the Maidenhead locator for a position, truncated to `length`
/// characters (6, 8 or 10).
///
/// Alternating radix expansion: field (base 24 on 20°/10°), square (base
/// 10), subsquare (base 24), extended square (base 10), and a fifth pair.
pub fn maidenhead(latitude: f32, longitude: f32, length: usize) -> String {
    let mut loc = [0u8; 10];

    let d = 0.5 * (180.0 + longitude);
    let field = (0.1 * d) as i32;
    loc[0] = b'A' + field as u8;
    let rj = d - 10.0 * field as f32;
    let square = rj as i32;
    loc[2] = b'0' + square as u8;
    let rk = 24.0 * (rj - square as f32);
    let sub = rk as i32;
    loc[4] = b'A' + sub as u8;
    let rl = 10.0 * (rk - sub as f32);
    let ext = rl as i32;
    loc[6] = b'0' + ext as u8;
    let rm = 24.0 * (rl - ext as f32);
    loc[8] = b'A' + rm as u8;

    let d = 90.0 + latitude;
    let field = (0.1 * d) as i32;
    loc[1] = b'A' + field as u8;
    let rj = d - 10.0 * field as f32;
    let square = rj as i32;
    loc[3] = b'0' + square as u8;
    let rk = 24.0 * (rj - square as f32);
    let sub = rk as i32;
    loc[5] = b'A' + sub as u8;
    let rl = 10.0 * (rk - sub as f32);
    let ext = rl as i32;
    loc[7] = b'0' + ext as u8;
    let rm = 24.0 * (rl - ext as f32);
    loc[9] = b'A' + rm as u8;

    let len = length.clamp(2, 10);
    String::from_utf8_lossy(&loc[..len]).into_owned()
}

/// Replace every occurrence of `token` in `template` with `replacement`.
pub fn replace_token(template: &[u8], token: u8, replacement: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(template.len() + replacement.len());
    for &b in template {
        if b == token {
            out.extend_from_slice(replacement);
        } else {
            out.push(b);
        }
    }
    out
}
