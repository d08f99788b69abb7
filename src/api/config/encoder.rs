// Copyright (c) 2020, The evce contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use itertools::*;

use crate::api::config::*;
use crate::partition::{MAX_CU_LOG2, MIN_CU_LOG2, MIN_CU_SIZE};
use crate::quantize::MAX_QP;
use crate::serialize::{Deserialize, Serialize};
use crate::tiling::{MAX_TILE_COLS, MAX_TILE_ROWS};
use crate::util::ChromaSampling;

use std::fmt;

/// Smallest CTU, in log2 luma samples.
pub const MIN_CTU_LOG2: usize = 4;
/// Pictures are coded in whole 8x8 blocks.
pub const PICTURE_ALIGN: usize = 2 * MIN_CU_SIZE;
/// Largest Cb/Cr QP offset.
pub const MAX_CHROMA_QP_OFFSET: i8 = 12;

/// Encoder settings which impact the decisions of the search.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EncoderConfig {
  // output size
  /// Width of the frames in pixels.
  pub width: usize,
  /// Height of the frames in pixels.
  pub height: usize,

  // data format
  /// Bit depth.
  pub bit_depth: usize,
  /// Chroma subsampling.
  pub chroma_sampling: ChromaSampling,

  /// log2 of the coding tree unit size.
  pub ctu_log2: usize,

  // quantization
  /// QP of every tile when no per-picture QP is given.
  pub base_qp: u8,
  /// Cb and Cr QP offsets.
  pub chroma_qp_offset: [i8; 2],
  /// Coding units may signal a QP delta.
  pub cu_qp_delta: bool,
  /// log2 of the area, in luma samples, sharing one QP delta.
  pub cu_qp_delta_area: usize,
  /// Largest QP delta the search tries above the tile QP. Negative values
  /// search below it.
  pub max_dqp: i8,
  /// Derive each QP group's QP from the per-picture offset map instead of
  /// searching.
  pub adaptive_qp: bool,

  // coding tools
  /// Measure the effect of the deblocking filter on each candidate.
  pub deblocking: bool,
  /// Intra prediction only uses intra coded neighbors.
  pub constrained_intra_pred: bool,

  /// Number of tile columns. Clamped to the number of CTU columns.
  pub tile_cols: usize,
  /// Number of tile rows. Clamped to the number of CTU rows.
  pub tile_rows: usize,

  /// Settings which affect the search speed.
  pub speed_settings: SpeedSettings,
}

/// Default preset for `EncoderConfig`: it is a balance between quality and
/// speed. See [`with_speed_preset()`].
///
/// [`with_speed_preset()`]: struct.EncoderConfig.html#method.with_speed_preset
impl Default for EncoderConfig {
  fn default() -> Self {
    const DEFAULT_SPEED: usize = 6;
    Self::with_speed_preset(DEFAULT_SPEED)
  }
}

impl EncoderConfig {
  /// This is a preset which provides default settings according to a speed
  /// value in the specific range 0–10. Each speed value corresponds to a
  /// different preset. See [`from_preset()`]. If the input value is greater
  /// than 10, it will result in the same settings as 10.
  ///
  /// [`from_preset()`]: struct.SpeedSettings.html#method.from_preset
  pub fn with_speed_preset(speed: usize) -> Self {
    EncoderConfig {
      width: 640,
      height: 480,
      bit_depth: 8,
      chroma_sampling: ChromaSampling::Cs420,
      ctu_log2: 6,
      base_qp: 32,
      chroma_qp_offset: [0, 0],
      cu_qp_delta: false,
      cu_qp_delta_area: 10,
      max_dqp: 2,
      adaptive_qp: false,
      deblocking: true,
      constrained_intra_pred: false,
      tile_cols: 1,
      tile_rows: 1,
      speed_settings: SpeedSettings::from_preset(speed),
    }
  }

  /// Validates the configuration.
  ///
  /// # Errors
  ///
  /// Returns the first problem found.
  pub fn validate(&self) -> Result<(), InvalidConfig> {
    use InvalidConfig::*;

    if self.width == 0 || self.width % PICTURE_ALIGN != 0 {
      return Err(InvalidWidth(self.width));
    }
    if self.height == 0 || self.height % PICTURE_ALIGN != 0 {
      return Err(InvalidHeight(self.height));
    }
    if self.bit_depth != 8 && self.bit_depth != 10 {
      return Err(InvalidBitDepth(self.bit_depth));
    }
    if self.chroma_sampling == ChromaSampling::Cs400 {
      return Err(UnsupportedChromaSampling(self.chroma_sampling));
    }
    if !(MIN_CTU_LOG2..=MAX_CU_LOG2).contains(&self.ctu_log2) {
      return Err(InvalidCtuSize {
        actual: self.ctu_log2,
        min: MIN_CTU_LOG2,
        max: MAX_CU_LOG2,
      });
    }
    if self.base_qp > MAX_QP {
      return Err(InvalidQp { actual: self.base_qp, max: MAX_QP });
    }
    if let Some(&offset) = self
      .chroma_qp_offset
      .iter()
      .find(|o| o.unsigned_abs() > MAX_CHROMA_QP_OFFSET as u8)
    {
      return Err(InvalidChromaQpOffset(offset));
    }
    if self.cu_qp_delta {
      let area = self.cu_qp_delta_area;
      if area % 2 != 0
        || area < 2 * MIN_CU_LOG2
        || area > 2 * self.ctu_log2
      {
        return Err(InvalidQpDeltaArea(area));
      }
      if self.max_dqp.unsigned_abs() > MAX_QP {
        return Err(InvalidMaxDeltaQp(self.max_dqp));
      }
    }

    let range = self.speed_settings.partition_range;
    if range.min_log2 < MIN_CU_LOG2
      || range.min_log2 > range.max_log2
      || range.min_log2 > self.ctu_log2
    {
      return Err(InvalidPartitionRange {
        min: range.min_log2,
        max: range.max_log2,
      });
    }

    if self.tile_cols == 0 || self.tile_cols > MAX_TILE_COLS {
      return Err(InvalidTileCols(self.tile_cols));
    }
    if self.tile_rows == 0 || self.tile_rows > MAX_TILE_ROWS {
      return Err(InvalidTileRows(self.tile_rows));
    }

    Ok(())
  }

  /// Tiling of the picture implied by this configuration.
  pub fn tiling(&self) -> TilingInfo {
    TilingInfo::new(
      self.ctu_log2,
      self.width,
      self.height,
      self.tile_cols,
      self.tile_rows,
    )
  }
}

impl fmt::Display for EncoderConfig {
  fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
    let ctu = 1 << self.ctu_log2;
    let pairs = [
      ("size", format!("{}x{}", self.width, self.height)),
      ("bit_depth", self.bit_depth.to_string()),
      ("chroma", format!("{:?}", self.chroma_sampling)),
      ("ctu", format!("{}x{}", ctu, ctu)),
      ("qp", self.base_qp.to_string()),
      ("cu_qp_delta", self.cu_qp_delta.to_string()),
      ("adaptive_qp", self.adaptive_qp.to_string()),
      ("deblocking", self.deblocking.to_string()),
      ("tiles", format!("{}x{}", self.tile_cols, self.tile_rows)),
      ("speed", self.speed_settings.to_string()),
    ];
    write!(
      f,
      "{}",
      pairs.iter().map(|pair| format!("{}={}", pair.0, pair.1)).join(" ")
    )
  }
}
