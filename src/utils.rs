//! Bounding-box encodings.
//!
//! - xyxy: `[x1, y1, x2, y2]` (opposite corners)
//! - tlwh: `[top-left x, top-left y, width, height]`
//! - xyah: `[center x, center y, aspect ratio (w / h), height]`

/// Corners to top-left/width/height.
pub fn xyxy_to_tlwh(b: &[f64; 4]) -> [f64; 4] {
    [b[0], b[1], b[2] - b[0], b[3] - b[1]]
}

/// Top-left/width/height to corners.
pub fn tlwh_to_xyxy(b: &[f64; 4]) -> [f64; 4] {
    [b[0], b[1], b[0] + b[2], b[1] + b[3]]
}

/// Top-left/width/height to center/aspect/height.
pub fn tlwh_to_xyah(b: &[f64; 4]) -> [f64; 4] {
    let [x, y, w, h] = *b;
    [x + w / 2.0, y + h / 2.0, w / h, h]
}

/// Center/aspect/height to top-left/width/height.
pub fn xyah_to_tlwh(b: &[f64; 4]) -> [f64; 4] {
    let [cx, cy, a, h] = *b;
    let w = a * h;
    [cx - w / 2.0, cy - h / 2.0, w, h]
}

pub fn xyxy_to_xyah(b: &[f64; 4]) -> [f64; 4] {
    tlwh_to_xyah(&xyxy_to_tlwh(b))
}

pub fn xyah_to_xyxy(b: &[f64; 4]) -> [f64; 4] {
    tlwh_to_xyxy(&xyah_to_tlwh(b))
}
