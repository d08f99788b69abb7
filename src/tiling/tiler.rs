// Copyright (c) 2019, The evce contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

pub const MAX_TILE_COLS: usize = 20;
pub const MAX_TILE_ROWS: usize = 22;

/// Rectangle of a tile, in luma samples of the picture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRect {
  pub x: usize,
  pub y: usize,
  pub width: usize,
  pub height: usize,
}

/// Tiling information
///
/// Splits a picture into a uniform grid of tiles made of whole CTUs. The
/// last column and row absorb the remainder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilingInfo {
  pub frame_width: usize,
  pub frame_height: usize,
  pub tile_width_ctu: usize,
  pub tile_height_ctu: usize,
  pub cols: usize, // number of columns of tiles within the whole frame
  pub rows: usize, // number of rows of tiles within the whole frame
  pub ctu_size_log2: usize,
}

impl TilingInfo {
  pub fn new(
    ctu_size_log2: usize, frame_width: usize, frame_height: usize,
    tile_cols: usize, tile_rows: usize,
  ) -> Self {
    let ctu_cols = Self::ctus(frame_width, ctu_size_log2);
    let ctu_rows = Self::ctus(frame_height, ctu_size_log2);

    let tile_cols = tile_cols.clamp(1, ctu_cols.min(MAX_TILE_COLS));
    let tile_rows = tile_rows.clamp(1, ctu_rows.min(MAX_TILE_ROWS));
    let tile_width_ctu = (ctu_cols + tile_cols - 1) / tile_cols;
    let tile_height_ctu = (ctu_rows + tile_rows - 1) / tile_rows;

    Self {
      frame_width,
      frame_height,
      tile_width_ctu,
      tile_height_ctu,
      cols: (ctu_cols + tile_width_ctu - 1) / tile_width_ctu,
      rows: (ctu_rows + tile_height_ctu - 1) / tile_height_ctu,
      ctu_size_log2,
    }
  }

  #[inline(always)]
  fn ctus(len: usize, ctu_size_log2: usize) -> usize {
    (len + (1 << ctu_size_log2) - 1) >> ctu_size_log2
  }

  #[inline(always)]
  pub fn tile_count(&self) -> usize {
    self.cols * self.rows
  }

  /// Rectangle of the tile at index `idx`, in raster order.
  pub fn tile_rect(&self, idx: usize) -> TileRect {
    debug_assert!(idx < self.tile_count());
    let tw = self.tile_width_ctu << self.ctu_size_log2;
    let th = self.tile_height_ctu << self.ctu_size_log2;
    let x = (idx % self.cols) * tw;
    let y = (idx / self.cols) * th;
    TileRect {
      x,
      y,
      width: tw.min(self.frame_width - x),
      height: th.min(self.frame_height - y),
    }
  }

  pub fn tile_rects(&self) -> impl Iterator<Item = TileRect> + '_ {
    (0..self.tile_count()).map(move |idx| self.tile_rect(idx))
  }
}

#[cfg(test)]
pub mod test {
  use super::*;

  #[test]
  fn test_tiling_info_from_tile_count() {
    let ti = TilingInfo::new(6, 1920, 1080, 1, 1);
    assert_eq!(1, ti.cols);
    assert_eq!(1, ti.rows);
    assert_eq!(30, ti.tile_width_ctu);
    assert_eq!(17, ti.tile_height_ctu);

    let ti = TilingInfo::new(6, 1920, 1080, 4, 2);
    assert_eq!(4, ti.cols);
    assert_eq!(2, ti.rows);
    assert_eq!(8, ti.tile_width_ctu);
    assert_eq!(9, ti.tile_height_ctu);

    // More tiles than CTUs.
    let ti = TilingInfo::new(6, 120, 64, 8, 8);
    assert_eq!((2, 1), (ti.cols, ti.rows));
  }

  #[test]
  fn tiles_cover_the_frame() {
    let ti = TilingInfo::new(6, 1920, 1080, 4, 2);
    let rects: Vec<_> = ti.tile_rects().collect();
    assert_eq!(rects.len(), 8);
    assert_eq!(rects[0], TileRect { x: 0, y: 0, width: 512, height: 576 });
    assert_eq!(
      rects[7],
      TileRect { x: 1536, y: 576, width: 384, height: 504 }
    );
    let area: usize = rects.iter().map(|r| r.width * r.height).sum();
    assert_eq!(area, 1920 * 1080);
  }
}
