//! Text camera files.
//!
//! ```text
//! extrinsic
//! r00 r01 r02 t0
//! r10 r11 r12 t1
//! r20 r21 r22 t2
//! 0 0 0 1
//!
//! intrinsic
//! fx 0 cx
//! 0 fy cy
//! 0 0 1
//!
//! depth_min interval [depth_num depth_max]
//! ```
use crate::camera::Camera;
use crate::error::InputError;
use nalgebra::{Matrix3, Vector3};
use std::fs;
use std::path::Path;

/// Parse a camera file. `width`/`height` are left at zero; callers set them
/// from the image the camera belongs to.
pub fn read_camera(path: &Path) -> Result<Camera, InputError> {
    let text = fs::read_to_string(path).map_err(|e| InputError::io(path, e))?;
    parse_camera(&text).map_err(|message| InputError::parse(path, message))
}

type Tokens<'a> = std::str::SplitWhitespace<'a>;

fn expect_label(tokens: &mut Tokens<'_>, label: &str) -> Result<(), String> {
    match tokens.next() {
        Some(t) if t.eq_ignore_ascii_case(label) => Ok(()),
        Some(t) => Err(format!("expected '{label}', found '{t}'")),
        None => Err(format!("missing '{label}'")),
    }
}

fn number(tokens: &mut Tokens<'_>, what: &str) -> Result<f32, String> {
    let t = tokens.next().ok_or_else(|| format!("missing {what}"))?;
    t.parse::<f32>()
        .map_err(|e| format!("invalid {what} '{t}': {e}"))
}

fn parse_camera(text: &str) -> Result<Camera, String> {
    let mut tokens = text.split_whitespace();
    expect_label(&mut tokens, "extrinsic")?;
    let mut extrinsic = [0.0f32; 16];
    for v in extrinsic.iter_mut() {
        *v = number(&mut tokens, "extrinsic entry")?;
    }
    expect_label(&mut tokens, "intrinsic")?;
    let mut intrinsic = [0.0f32; 9];
    for v in intrinsic.iter_mut() {
        *v = number(&mut tokens, "intrinsic entry")?;
    }
    let depth_min = number(&mut tokens, "depth_min")?;
    let interval = number(&mut tokens, "depth interval")?;
    let depth_num = tokens.next().and_then(|t| t.parse::<f32>().ok());
    let depth_max = match tokens.next().and_then(|t| t.parse::<f32>().ok()) {
        Some(max) => max,
        None => depth_min + interval * depth_num.unwrap_or(192.0),
    };

    let e = &extrinsic;
    Ok(Camera {
        r: Matrix3::new(e[0], e[1], e[2], e[4], e[5], e[6], e[8], e[9], e[10]),
        t: Vector3::new(e[3], e[7], e[11]),
        k: Matrix3::from_row_slice(&intrinsic),
        width: 0,
        height: 0,
        depth_min,
        depth_max,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "extrinsic
1 0 0 0.5
0 1 0 -0.25
0 0 1 2
0 0 0 1

intrinsic
1000 0 320
0 1100 240
0 0 1

425 2.5 192 905
";

    #[test]
    fn parses_full_camera_file() {
        let cam = parse_camera(SAMPLE).expect("parse");
        assert_eq!(cam.r, Matrix3::identity());
        assert_eq!(cam.t, Vector3::new(0.5, -0.25, 2.0));
        assert_eq!(cam.fx(), 1000.0);
        assert_eq!(cam.fy(), 1100.0);
        assert_eq!(cam.cx(), 320.0);
        assert_eq!(cam.cy(), 240.0);
        assert_eq!(cam.depth_min, 425.0);
        assert_eq!(cam.depth_max, 905.0);
    }

    #[test]
    fn derives_depth_max_from_interval() {
        let short = SAMPLE.replace("425 2.5 192 905", "1.0 0.5 4");
        let cam = parse_camera(&short).expect("parse");
        assert_eq!(cam.depth_max, 3.0);
    }

    #[test]
    fn rejects_missing_sections() {
        let err = parse_camera("intrinsic 1 0 0").expect_err("bad");
        assert!(err.contains("extrinsic"));
    }
}
