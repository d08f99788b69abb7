// Copyright (c) 2017-2022, The evce contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use crate::context::DqpState;
use crate::partition::*;
use crate::util::*;

use std::ops::RangeInclusive;

pub const MIN_QP: u8 = 0;
pub const MAX_QP: u8 = 51;
const QP_COUNT: usize = MAX_QP as usize + 1;

/// Luma to chroma QP mapping for subsampled chroma, indexed by
/// `qp + chroma_qp_offset` clamped to the QP range.
const CHROMA_QP_TABLE: [u8; QP_COUNT] = [
  0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19, 20,
  21, 22, 23, 24, 25, 26, 27, 28, 29, 29, 30, 31, 32, 33, 33, 34, 34, 35, 35,
  36, 36, 37, 37, 38, 39, 40, 41, 42, 43, 44, 45,
];

#[inline]
pub fn clamp_qp(qp: i32) -> u8 {
  clamp(qp, MIN_QP as i32, MAX_QP as i32) as u8
}

/// Per-picture QP derived quantities, precomputed for every QP.
#[derive(Debug, Clone)]
pub struct QpTables {
  lambda: [f64; QP_COUNT],
  chroma_qp: [[u8; QP_COUNT]; 2],
  chroma_weight: [[f64; QP_COUNT]; 2],
}

impl QpTables {
  pub fn new(
    bit_depth: usize, chroma_qp_offset: [i8; 2], chroma_subsampled: bool,
  ) -> Self {
    let depth_scale = (1u64 << (2 * (bit_depth - 8))) as f64;
    let mut lambda = [0.; QP_COUNT];
    let mut chroma_qp = [[0u8; QP_COUNT]; 2];
    let mut chroma_weight = [[1.; QP_COUNT]; 2];

    for qp in 0..QP_COUNT {
      lambda[qp] = 0.57 * 2f64.powf((qp as f64 - 12.) / 3.) * depth_scale;
      for c in 0..2 {
        let q = clamp_qp(qp as i32 + chroma_qp_offset[c] as i32);
        let qpc = if chroma_subsampled {
          CHROMA_QP_TABLE[q as usize]
        } else {
          q
        };
        chroma_qp[c][qp] = qpc;
        chroma_weight[c][qp] = 2f64.powf((qp as f64 - qpc as f64) / 3.);
      }
    }

    QpTables { lambda, chroma_qp, chroma_weight }
  }

  #[inline]
  pub fn lambda(&self, qp: u8) -> f64 {
    self.lambda[qp as usize]
  }

  /// QP of chroma plane `p` (1 or 2) for luma QP `qp`.
  #[inline]
  pub fn chroma_qp(&self, p: usize, qp: u8) -> u8 {
    self.chroma_qp[p - 1][qp as usize]
  }

  /// Distortion weight of plane `p` relative to luma.
  #[inline]
  pub fn dist_weight(&self, p: usize, qp: u8) -> f64 {
    if p == 0 {
      1.
    } else {
      self.chroma_weight[p - 1][qp as usize]
    }
  }

  /// Effective QP of every plane.
  #[inline]
  pub fn plane_qps(&self, qp: u8) -> [u8; PLANES] {
    [qp, self.chroma_qp(1, qp), self.chroma_qp(2, qp)]
  }
}

/// Per-pixel QP offsets, e.g. from adaptive quantization or a
/// temporal-propagation model.
#[derive(Debug, Clone, PartialEq)]
pub struct QpOffsetMap {
  pub width: usize,
  pub height: usize,
  pub offsets: Vec<f32>,
}

impl QpOffsetMap {
  pub fn new(width: usize, height: usize) -> Self {
    QpOffsetMap { width, height, offsets: vec![0.; width * height] }
  }

  /// Mean offset over the part of the rectangle inside the map.
  pub fn mean(&self, x: usize, y: usize, w: usize, h: usize) -> f32 {
    let x1 = (x + w).min(self.width);
    let y1 = (y + h).min(self.height);
    if x >= x1 || y >= y1 {
      return 0.;
    }
    let sum: f64 = self
      .offsets
      .chunks(self.width)
      .skip(y)
      .take(y1 - y)
      .map(|row| row[x..x1].iter().map(|&v| v as f64).sum::<f64>())
      .sum();
    (sum / ((x1 - x) * (y1 - y)) as f64) as f32
  }
}

/// Picture-level delta QP signalling parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DqpParams {
  /// QP of the tile (or slice) before any delta is applied.
  pub tile_qp: u8,
  /// Coding units may signal a QP delta.
  pub enabled: bool,
  /// log2 of the area, in luma samples, of a QP group.
  pub area_log2: usize,
  /// Largest delta above `tile_qp` a group may pick. Negative values search
  /// below the tile QP.
  pub max_delta: i8,
}

/// Delta QP is not signalled in the current subtree yet.
pub const DQP_CODE_NONE: u8 = 0;
/// A leaf at or above the group area signals its own delta.
pub const DQP_CODE_LEAF: u8 = 1;
/// A split node exactly at the group area opened a group for its subtree.
pub const DQP_CODE_AREA: u8 = 2;

/// QPs a node may try.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QpRange {
  pub min_qp: u8,
  pub max_qp: u8,
  /// This node starts a new QP group, so its delta has to be signalled
  /// again by its first coding unit with coefficients.
  pub is_dqp_set: bool,
}

impl QpRange {
  pub const fn single(qp: u8) -> Self {
    QpRange { min_qp: qp, max_qp: qp, is_dqp_set: false }
  }

  pub fn iter(&self) -> RangeInclusive<u8> {
    self.min_qp..=self.max_qp
  }

  fn spanning(a: i32, b: i32, is_dqp_set: bool) -> Self {
    let (a, b) = (clamp_qp(a), clamp_qp(b));
    QpRange { min_qp: a.min(b), max_qp: a.max(b), is_dqp_set }
  }
}

/// Picks the QPs `node` evaluates for `split_mode`, given the QP chosen by
/// its parent. Returns the range and the delta QP code mode that applies
/// to the node's subtree.
pub fn select_qp_range(
  params: &DqpParams, offsets: Option<&QpOffsetMap>, node: &CodingNode,
  split_mode: SplitMode, parent_qp: u8, dqp: &DqpState,
) -> (QpRange, u8) {
  let tile_qp = params.tile_qp as i32;
  let mut code = dqp.cu_qp_delta_code;

  if !params.enabled {
    return (QpRange::spanning(tile_qp, tile_qp, false), code);
  }

  let area_log2 = node.log2_w + node.log2_h;
  let opens_group = match split_mode {
    SplitMode::NO_SPLIT => area_log2 >= params.area_log2,
    SplitMode::SPLIT_QUAD => area_log2 == params.area_log2,
  } && code != DQP_CODE_AREA;

  if let Some(map) = offsets {
    let offset =
      map.mean(node.x, node.y, node.width(), node.height()).round() as i32;
    if opens_group {
      code = match split_mode {
        SplitMode::NO_SPLIT => DQP_CODE_LEAF,
        SplitMode::SPLIT_QUAD => DQP_CODE_AREA,
      };
      return (
        QpRange::spanning(tile_qp + offset, tile_qp + offset, true),
        code,
      );
    }
    return (QpRange::single(clamp_qp(parent_qp as i32)), code);
  }

  if opens_group {
    code = match split_mode {
      SplitMode::NO_SPLIT => DQP_CODE_LEAF,
      SplitMode::SPLIT_QUAD => DQP_CODE_AREA,
    };
    let range =
      QpRange::spanning(tile_qp, tile_qp + params.max_delta as i32, true);
    return (range, code);
  }

  // Inside a group, or above one that a deeper node will open.
  (QpRange::single(clamp_qp(parent_qp as i32)), code)
}

/// Quantization step size of `qp` at `bit_depth`.
#[inline]
pub fn qstep(qp: u8, bit_depth: usize) -> f64 {
  2f64.powf((qp as f64 - 4.) / 6.) * (1 << (bit_depth - 8)) as f64
}

/// Rounding offset below one half, so small residuals fall in the dead
/// zone.
const DEADZONE_OFFSET: f64 = 1. / 3.;

/// Quantizes the residual `src - pred` of a `w`x`h` block in the sample
/// domain and reconstructs it.
///
/// `coef` and `reco` are resized to `w * h` and written row-major. Returns
/// the number of non-zero levels.
pub fn quantize_block<T: Pixel>(
  src: &[T], src_stride: usize, pred: &[T], w: usize, h: usize, qp: u8,
  bit_depth: usize, coef: &mut Vec<i32>, reco: &mut Vec<T>,
) -> u32 {
  let step = qstep(qp, bit_depth);
  let max = (1 << bit_depth) - 1;
  coef.clear();
  reco.clear();
  let mut nnz = 0;

  let rows = src.chunks(src_stride).zip(pred.chunks(w)).take(h);
  for (row_src, row_pred) in rows {
    for (&s, &p) in row_src[..w].iter().zip(row_pred) {
      let p = i32::cast_from(p);
      let r = i32::cast_from(s) - p;
      let level = (r.abs() as f64 / step + DEADZONE_OFFSET) as i32;
      let level = if r < 0 { -level } else { level };
      nnz += (level != 0) as u32;
      coef.push(level);
      let dq = (level as f64 * step).round() as i32;
      reco.push(T::cast_from(clamp(p + dq, 0, max)));
    }
  }

  nnz
}
