// Copyright (c) 2018-2022, The evce contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use crate::partition::*;
use crate::util::*;
use v_frame::plane::Plane;

/// Three-plane picture buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame<T: Pixel> {
  pub planes: [Plane<T>; PLANES],
}

impl<T: Pixel> Frame<T> {
  /// Allocates an unpadded picture.
  ///
  /// # Panics
  ///
  /// Panics for 4:0:0, which has no chroma planes to allocate.
  pub fn new(width: usize, height: usize, cs: ChromaSampling) -> Self {
    let Some((xdec, ydec)) = cs.get_decimation() else {
      panic!("monochrome pictures are not supported");
    };
    let (cw, ch) = cs.get_chroma_dimensions(width, height);

    Frame {
      planes: [
        Plane::new(width, height, 0, 0, 0, 0),
        Plane::new(cw, ch, xdec, ydec, 0, 0),
        Plane::new(cw, ch, xdec, ydec, 0, 0),
      ],
    }
  }

  /// Fills every plane with a single value.
  pub fn fill(&mut self, value: T) {
    for p in self.planes.iter_mut() {
      p.data.fill(value);
    }
  }

  #[inline]
  pub fn width(&self) -> usize {
    self.planes[0].cfg.width
  }

  #[inline]
  pub fn height(&self) -> usize {
    self.planes[0].cfg.height
  }

  /// Row-major view starting at (`x`, `y`) of plane `p`, and its stride.
  #[inline]
  pub fn block(&self, p: usize, x: usize, y: usize) -> (&[T], usize) {
    let plane = &self.planes[p];
    let stride = plane.cfg.stride;
    (&plane.data_origin()[y * stride + x..], stride)
  }
}

/// Coding unit decided; set by the search and the final commit.
pub const SCU_CODED: u32 = 1 << 0;
pub const SCU_INTRA: u32 = 1 << 1;
pub const SCU_SKIP: u32 = 1 << 2;
pub const SCU_IBC: u32 = 1 << 3;
pub const SCU_MMVD: u32 = 1 << 4;
pub const SCU_AFFINE: u32 = 1 << 5;
pub const SCU_CBF_LUMA: u32 = 1 << 6;
pub const SCU_CBF_CHROMA: u32 = 1 << 7;
/// Written during the search only; cleared when a CTU is committed.
pub const SCU_IN_PROGRESS: u32 = 1 << 8;

/// Block-level side information at 4x4 (SCU) granularity.
///
/// The maps cover a rectangle of the picture starting at SCU
/// (`x_scu`, `y_scu`): the whole picture, or a single tile during the
/// search. Lookups outside the rectangle report "not coded".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameMaps {
  pub x_scu: usize,
  pub y_scu: usize,
  pub w_scu: usize,
  pub h_scu: usize,
  pub scu: Vec<u32>,
  pub ipm: Vec<[u8; 2]>,
  pub mv: Vec<[MotionVector; REFP_NUM]>,
  pub refi: Vec<[i8; REFP_NUM]>,
  pub depth: Vec<u8>,
  pub qp: Vec<u8>,
}

impl FrameMaps {
  pub fn new(x_scu: usize, y_scu: usize, w_scu: usize, h_scu: usize) -> Self {
    let len = w_scu * h_scu;
    FrameMaps {
      x_scu,
      y_scu,
      w_scu,
      h_scu,
      scu: vec![0; len],
      ipm: vec![[0; 2]; len],
      mv: vec![[MotionVector::default(); REFP_NUM]; len],
      refi: vec![[REFI_INVALID; REFP_NUM]; len],
      depth: vec![0; len],
      qp: vec![0; len],
    }
  }

  /// Maps covering a whole picture of the given luma size.
  pub fn for_picture(width: usize, height: usize) -> Self {
    Self::new(
      0,
      0,
      (width + MIN_CU_SIZE - 1) >> MIN_CU_LOG2,
      (height + MIN_CU_SIZE - 1) >> MIN_CU_LOG2,
    )
  }

  /// Index of picture SCU (`x`, `y`), if it lies within these maps.
  #[inline]
  pub fn idx(&self, x: isize, y: isize) -> Option<usize> {
    let (x0, y0) = (self.x_scu as isize, self.y_scu as isize);
    if x < x0
      || y < y0
      || x >= x0 + self.w_scu as isize
      || y >= y0 + self.h_scu as isize
    {
      return None;
    }
    Some((y - y0) as usize * self.w_scu + (x - x0) as usize)
  }

  #[inline]
  pub fn flags(&self, x: isize, y: isize) -> u32 {
    self.idx(x, y).map_or(0, |i| self.scu[i])
  }

  #[inline]
  pub fn is_coded(&self, x: isize, y: isize) -> bool {
    self.flags(x, y) & SCU_CODED != 0
  }

  /// SCU rectangle of `node` clipped to these maps, as
  /// (first column, first row, columns, rows) in map coordinates.
  pub fn clip_node(
    &self, node: &CodingNode,
  ) -> Option<(usize, usize, usize, usize)> {
    let x0 = (node.x >> MIN_CU_LOG2).max(self.x_scu);
    let y0 = (node.y >> MIN_CU_LOG2).max(self.y_scu);
    let x1 = ((node.x + node.width()) >> MIN_CU_LOG2)
      .min(self.x_scu + self.w_scu);
    let y1 = ((node.y + node.height()) >> MIN_CU_LOG2)
      .min(self.y_scu + self.h_scu);
    if x0 >= x1 || y0 >= y1 {
      return None;
    }
    Some((x0 - self.x_scu, y0 - self.y_scu, x1 - x0, y1 - y0))
  }

  /// Forgets every decision inside `node`, so neighbors of a region that is
  /// being re-evaluated see it as not yet coded.
  pub fn clear_region(&mut self, node: &CodingNode) {
    if let Some((x, y, w, h)) = self.clip_node(node) {
      fill_rect(&mut self.scu, self.w_scu, x, y, w, h, 0);
    }
  }

  /// Copies the maps of a sub-rectangle (usually a tile) into place.
  pub fn scatter_from(&mut self, other: &FrameMaps) {
    debug_assert!(other.x_scu >= self.x_scu && other.y_scu >= self.y_scu);
    let x = other.x_scu - self.x_scu;
    let y = other.y_scu - self.y_scu;
    let (w, h) = (other.w_scu, other.h_scu);
    let stride = self.w_scu;
    copy_rect(&mut self.scu, stride, x, y, &other.scu, w, 0, 0, w, h);
    copy_rect(&mut self.ipm, stride, x, y, &other.ipm, w, 0, 0, w, h);
    copy_rect(&mut self.mv, stride, x, y, &other.mv, w, 0, 0, w, h);
    copy_rect(&mut self.refi, stride, x, y, &other.refi, w, 0, 0, w, h);
    copy_rect(&mut self.depth, stride, x, y, &other.depth, w, 0, 0, w, h);
    copy_rect(&mut self.qp, stride, x, y, &other.qp, w, 0, 0, w, h);
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn frame_chroma_dimensions() {
    let f = Frame::<u8>::new(64, 32, ChromaSampling::Cs420);
    assert_eq!(f.planes[1].cfg.width, 32);
    assert_eq!(f.planes[1].cfg.height, 16);
    assert_eq!(f.planes[2].cfg.xdec, 1);

    let f = Frame::<u16>::new(64, 32, ChromaSampling::Cs444);
    assert_eq!(f.planes[2].cfg.width, 64);
    assert_eq!(f.planes[2].cfg.ydec, 0);
  }

  #[test]
  fn lookups_outside_the_maps_are_not_coded() {
    let mut maps = FrameMaps::new(16, 0, 16, 16);
    maps.scu.fill(SCU_CODED);
    assert!(maps.is_coded(16, 0));
    assert!(maps.is_coded(31, 15));
    assert!(!maps.is_coded(15, 0));
    assert!(!maps.is_coded(32, 0));
    assert!(!maps.is_coded(16, -1));
  }

  #[test]
  fn clear_region_is_clipped() {
    let mut maps = FrameMaps::for_picture(40, 32);
    maps.scu.fill(SCU_CODED | SCU_INTRA);
    let node = CodingNode::root(32, 16, 5);
    maps.clear_region(&node);
    assert!(!maps.is_coded(8, 4));
    assert!(!maps.is_coded(9, 7));
    assert!(maps.is_coded(7, 4));
    assert!(maps.is_coded(8, 3));
    assert_eq!(maps.scu.iter().filter(|&&f| f == 0).count(), 8);
  }

  #[test]
  fn scatter_places_tile_maps() {
    let mut pic = FrameMaps::for_picture(64, 32);
    let mut tile = FrameMaps::new(8, 0, 8, 8);
    tile.qp.fill(30);
    tile.scu.fill(SCU_CODED);
    pic.scatter_from(&tile);
    assert!(pic.is_coded(8, 0) && pic.is_coded(15, 7));
    assert!(!pic.is_coded(7, 0) && !pic.is_coded(16, 0));
    assert_eq!(pic.qp.iter().filter(|&&q| q == 30).count(), 64);
  }
}
