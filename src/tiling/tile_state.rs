// Copyright (c) 2019-2022, The evce contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use super::*;

use crate::frame::*;
use crate::partition::*;
use crate::util::*;
use std::sync::Arc;

/// Reconstruction of a single tile, addressed in picture coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileFrame<T: Pixel> {
  /// Luma position of the tile in the picture.
  pub x: usize,
  pub y: usize,
  pub frame: Frame<T>,
}

impl<T: Pixel> TileFrame<T> {
  pub fn new(rect: &TileRect, cs: ChromaSampling) -> Self {
    let frame = Frame::new(rect.width, rect.height, cs);
    TileFrame { x: rect.x, y: rect.y, frame }
  }

  #[inline]
  pub fn decimation(&self, p: usize) -> (usize, usize) {
    let cfg = &self.frame.planes[p].cfg;
    (cfg.xdec, cfg.ydec)
  }

  /// Tile origin in the samples of plane `p`.
  #[inline]
  pub fn plane_origin(&self, p: usize) -> (usize, usize) {
    let (xdec, ydec) = self.decimation(p);
    (self.x >> xdec, self.y >> ydec)
  }

  /// Sample of plane `p` at picture position (`x`, `y`) of that plane.
  #[inline]
  pub fn p(&self, p: usize, x: usize, y: usize) -> T {
    let (x0, y0) = self.plane_origin(p);
    self.frame.planes[p].p(x - x0, y - y0)
  }

  /// Copies a `w`x`h` block with top-left (`x`, `y`) in plane coordinates,
  /// dropping whatever falls outside the tile.
  pub fn write_block(
    &mut self, p: usize, x: usize, y: usize, w: usize, h: usize, src: &[T],
    src_stride: usize,
  ) {
    let (x0, y0) = self.plane_origin(p);
    let plane = &mut self.frame.planes[p];
    let (pw, ph) = (plane.cfg.width, plane.cfg.height);
    let (bx, by) = (x - x0, y - y0);
    if bx >= pw || by >= ph {
      return;
    }
    let stride = plane.cfg.stride;
    let (cw, ch) = (w.min(pw - bx), h.min(ph - by));
    let dst = plane.data_origin_mut();
    copy_rect(dst, stride, bx, by, src, src_stride, 0, 0, cw, ch);
  }
}

/// Everything one worker needs to search a tile.
///
/// The source picture and references are shared read-only; the
/// reconstruction and maps cover this tile only and are written by the
/// owning worker alone. Neighbor lookups into other tiles therefore see
/// nothing coded.
#[derive(Debug)]
pub struct TileState<'a, T: Pixel> {
  pub rect: TileRect,
  /// The whole source picture.
  pub input: &'a Frame<T>,
  /// Reference picture of each prediction list, if any.
  pub refs: &'a [Option<Arc<Frame<T>>>; REFP_NUM],
  pub rec: TileFrame<T>,
  pub maps: FrameMaps,
}

impl<'a, T: Pixel> TileState<'a, T> {
  pub fn new(
    rect: TileRect, input: &'a Frame<T>,
    refs: &'a [Option<Arc<Frame<T>>>; REFP_NUM], cs: ChromaSampling,
  ) -> Self {
    let maps = FrameMaps::new(
      rect.x >> MIN_CU_LOG2,
      rect.y >> MIN_CU_LOG2,
      rect.width >> MIN_CU_LOG2,
      rect.height >> MIN_CU_LOG2,
    );
    TileState { rect, input, refs, rec: TileFrame::new(&rect, cs), maps }
  }

  #[inline]
  pub fn contains(&self, x: usize, y: usize) -> bool {
    x >= self.rect.x
      && y >= self.rect.y
      && x < self.rect.x + self.rect.width
      && y < self.rect.y + self.rect.height
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn tile_frame_uses_picture_coordinates() {
    let rect = TileRect { x: 64, y: 32, width: 56, height: 32 };
    let mut tf = TileFrame::<u8>::new(&rect, ChromaSampling::Cs420);
    let block = [7u8; 16];
    tf.write_block(0, 112, 32, 4, 4, &block, 4);
    assert_eq!(tf.p(0, 112, 32), 7);
    assert_eq!(tf.p(0, 115, 35), 7);
    assert_eq!(tf.p(0, 111, 32), 128);

    // Clipped at the right edge of the tile.
    tf.write_block(1, 58, 16, 4, 2, &block, 4);
    assert_eq!(tf.plane_origin(1), (32, 16));
    assert_eq!(tf.p(1, 59, 17), 7);
  }

  #[test]
  fn tile_maps_cover_the_tile_only() {
    let input = Frame::<u8>::new(128, 64, ChromaSampling::Cs420);
    let refs = [None, None];
    let rect = TileRect { x: 64, y: 0, width: 64, height: 64 };
    let ts = TileState::new(rect, &input, &refs, ChromaSampling::Cs420);
    assert_eq!((ts.maps.x_scu, ts.maps.w_scu), (16, 16));
    assert!(ts.maps.idx(15, 0).is_none());
    assert!(ts.contains(64, 63) && !ts.contains(63, 0));
  }
}
