//! Color segmentation: HSV range mask plus connected-region extraction.
//!
//! The localizer only depends on the `RegionExtractor` trait; `HsvRegionExtractor`
//! is the default implementation.
//!
//! ## Pipeline
//! 1. RGB -> HSV on the OpenCV 8-bit scale (H 0..=179, S/V 0..=255)
//! 2. Inclusive in-range test per channel; hue wraps through 0 when `low > high`
//! 3. Two-pass 8-connected labelling with union-find
//! 4. Per-region bounding box and pixel-count area
use ndarray::Array2;
use pantrack_traits::Frame;

use crate::config::MaskParams;
use crate::types::BoundingBox;

/// One contiguous blob of mask pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub bbox: BoundingBox,
    /// Pixel count
    pub area: u32,
}

/// Source of candidate regions for a frame.
pub trait RegionExtractor {
    /// All contiguous regions matching `mask`, in no particular order.
    fn extract(&self, frame: &Frame, mask: &MaskParams) -> Vec<Region>;
}

impl<T: RegionExtractor + ?Sized> RegionExtractor for Box<T> {
    fn extract(&self, frame: &Frame, mask: &MaskParams) -> Vec<Region> {
        (**self).extract(frame, mask)
    }
}

/// Convert one RGB pixel to HSV on the OpenCV 8-bit scale.
pub fn rgb_to_hsv(rgb: [u8; 3]) -> (u8, u8, u8) {
    let [r, g, b] = rgb.map(i32::from);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let diff = max - min;

    let s = if max == 0 {
        0
    } else {
        (f64::from(diff) * 255.0 / f64::from(max)).round() as i32
    };

    let h_deg = if diff == 0 {
        0.0
    } else if max == r {
        60.0 * f64::from(g - b) / f64::from(diff)
    } else if max == g {
        120.0 + 60.0 * f64::from(b - r) / f64::from(diff)
    } else {
        240.0 + 60.0 * f64::from(r - g) / f64::from(diff)
    };
    let h_deg = if h_deg < 0.0 { h_deg + 360.0 } else { h_deg };
    let mut h = (h_deg / 2.0).round() as i32;
    if h >= 180 {
        h -= 180;
    }

    (h as u8, s.clamp(0, 255) as u8, max as u8)
}

/// Binary mask of pixels inside the HSV range, indexed `[[y, x]]`.
pub fn hsv_mask(frame: &Frame, mask: &MaskParams) -> Array2<bool> {
    let (w, h) = (frame.width() as usize, frame.height() as usize);
    Array2::from_shape_fn((h, w), |(y, x)| {
        let (hh, s, v) = rgb_to_hsv(frame.pixel(x as u32, y as u32));
        mask.contains(hh, s, v)
    })
}

fn find_root(parent: &mut [usize], label: usize) -> usize {
    let mut current = label;
    while current != parent[current] {
        parent[current] = parent[parent[current]];
        current = parent[current];
    }
    current
}

fn union_labels(parent: &mut [usize], a: usize, b: usize) {
    let ra = find_root(parent, a);
    let rb = find_root(parent, b);
    if ra < rb {
        parent[rb] = ra;
    } else if rb < ra {
        parent[ra] = rb;
    }
}

#[derive(Clone, Copy)]
struct Extent {
    min_x: usize,
    min_y: usize,
    max_x: usize,
    max_y: usize,
    area: u32,
}

/// 8-connected regions of a binary mask.
pub fn connected_regions(mask: &Array2<bool>) -> Vec<Region> {
    let (height, width) = mask.dim();
    let mut labels = Array2::<usize>::zeros((height, width));
    // label 0 is background
    let mut parent = vec![0usize];

    for y in 0..height {
        for x in 0..width {
            if !mask[[y, x]] {
                continue;
            }
            // Already-visited neighbours: W, NW, N, NE
            let mut neighbours = [0usize; 4];
            let mut n = 0;
            if x > 0 && labels[[y, x - 1]] > 0 {
                neighbours[n] = labels[[y, x - 1]];
                n += 1;
            }
            if y > 0 {
                if x > 0 && labels[[y - 1, x - 1]] > 0 {
                    neighbours[n] = labels[[y - 1, x - 1]];
                    n += 1;
                }
                if labels[[y - 1, x]] > 0 {
                    neighbours[n] = labels[[y - 1, x]];
                    n += 1;
                }
                if x + 1 < width && labels[[y - 1, x + 1]] > 0 {
                    neighbours[n] = labels[[y - 1, x + 1]];
                    n += 1;
                }
            }

            match neighbours[..n].iter().copied().min() {
                None => {
                    let label = parent.len();
                    parent.push(label);
                    labels[[y, x]] = label;
                }
                Some(min_label) => {
                    labels[[y, x]] = min_label;
                    for &other in &neighbours[..n] {
                        if other != min_label {
                            union_labels(&mut parent, min_label, other);
                        }
                    }
                }
            }
        }
    }

    let mut extents: Vec<Option<Extent>> = vec![None; parent.len()];
    for ((y, x), &label) in labels.indexed_iter() {
        if label == 0 {
            continue;
        }
        let root = find_root(&mut parent, label);
        let e = extents[root].get_or_insert(Extent {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
            area: 0,
        });
        e.min_x = e.min_x.min(x);
        e.min_y = e.min_y.min(y);
        e.max_x = e.max_x.max(x);
        e.max_y = e.max_y.max(y);
        e.area += 1;
    }

    extents
        .into_iter()
        .flatten()
        .map(|e| Region {
            bbox: BoundingBox {
                x: e.min_x as i32,
                y: e.min_y as i32,
                width: (e.max_x - e.min_x + 1) as u32,
                height: (e.max_y - e.min_y + 1) as u32,
            },
            area: e.area,
        })
        .collect()
}

/// Default extractor: HSV range mask followed by 8-connected labelling.
#[derive(Debug, Default, Clone, Copy)]
pub struct HsvRegionExtractor;

impl RegionExtractor for HsvRegionExtractor {
    fn extract(&self, frame: &Frame, mask: &MaskParams) -> Vec<Region> {
        connected_regions(&hsv_mask(frame, mask))
    }
}
