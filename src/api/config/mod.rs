// Copyright (c) 2020-2022, The evce contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use thiserror::Error;

use crate::util::ChromaSampling;

mod encoder;
pub use encoder::*;

mod speedsettings;
pub use speedsettings::*;

pub use crate::tiling::TilingInfo;

/// Enumeration of possible invalid configuration errors.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Error)]
#[non_exhaustive]
pub enum InvalidConfig {
  /// The width is invalid.
  #[error("invalid width {0} (expected a non-zero multiple of 8)")]
  InvalidWidth(usize),
  /// The height is invalid.
  #[error("invalid height {0} (expected a non-zero multiple of 8)")]
  InvalidHeight(usize),
  /// The bit depth is invalid.
  #[error("invalid bit depth {0} (expected 8 or 10)")]
  InvalidBitDepth(usize),
  /// The chroma sampling has no chroma planes to search.
  #[error("unsupported chroma sampling {0:?}")]
  UnsupportedChromaSampling(ChromaSampling),
  /// The CTU size is invalid.
  #[error("invalid CTU size log2 {actual} (expected >= {min}, <= {max})")]
  InvalidCtuSize {
    /// The actual value.
    actual: usize,
    /// The minimal supported value.
    min: usize,
    /// The maximal supported value.
    max: usize,
  },
  /// The QP is out of range.
  #[error("invalid QP {actual} (expected <= {max})")]
  InvalidQp {
    /// The actual value.
    actual: u8,
    /// The maximal supported value.
    max: u8,
  },
  /// A chroma QP offset is out of range.
  #[error("invalid chroma QP offset {0} (expected >= -12, <= 12)")]
  InvalidChromaQpOffset(i8),
  /// The QP delta area is invalid.
  #[error(
    "invalid QP delta area log2 {0} (expected even, within the CTU area)"
  )]
  InvalidQpDeltaArea(usize),
  /// The largest QP delta is out of range.
  #[error("invalid max delta QP {0}")]
  InvalidMaxDeltaQp(i8),
  /// The partition range is invalid.
  #[error("invalid partition range log2 {min}..={max}")]
  InvalidPartitionRange {
    /// Smallest size.
    min: usize,
    /// Largest size.
    max: usize,
  },
  /// Tile columns is invalid.
  #[error("invalid tile cols {0} (expected >= 1, <= 20)")]
  InvalidTileCols(usize),
  /// Tile rows is invalid.
  #[error("invalid tile rows {0} (expected >= 1, <= 22)")]
  InvalidTileRows(usize),
}
