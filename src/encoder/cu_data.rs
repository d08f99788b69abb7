// Copyright (c) 2018-2022, The evce contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use crate::frame::*;
use crate::partition::*;
use crate::predict::PredictionCandidate;
use crate::tiling::TileFrame;
use crate::util::*;

/// Full decision payload of a block of one size class.
///
/// Metadata is kept per 4x4 unit (SCU) in raster order over the block, so
/// that a record can hold either a single coding unit or a whole decided
/// subtree. Sample data is kept per plane at that plane's resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CuData<T: Pixel> {
  pub log2_w: usize,
  pub log2_h: usize,
  pub w_scu: usize,
  pub h_scu: usize,
  pub xdec: usize,
  pub ydec: usize,
  /// Split decision taken at each depth above the unit.
  pub split_mode: Vec<[SplitMode; MAX_CU_DEPTH]>,
  pub pred_mode: Vec<PredMode>,
  pub skip_flag: Vec<bool>,
  pub mmvd_flag: Vec<bool>,
  pub affine_flag: Vec<bool>,
  pub ipm: Vec<[u8; 2]>,
  pub mv: Vec<[MotionVector; REFP_NUM]>,
  pub refi: Vec<[i8; REFP_NUM]>,
  pub mvp_idx: Vec<[u8; REFP_NUM]>,
  pub qp_y: Vec<u8>,
  pub qp_u: Vec<u8>,
  pub qp_v: Vec<u8>,
  /// Non-zero levels of the coding unit covering the unit, per plane.
  pub nnz: Vec<[u32; PLANES]>,
  pub nnz_sub: Vec<[[u32; MAX_SUB_TB_NUM]; PLANES]>,
  pub depth: Vec<u8>,
  /// `SCU_*` flags, without the coded bit.
  pub map_scu: Vec<u32>,
  /// Serial number of the coding unit that wrote the unit; 0 if none did.
  pub trace: Vec<u32>,
  pub coef: [Vec<i32>; PLANES],
  pub reco: [Vec<T>; PLANES],
}

impl<T: Pixel> CuData<T> {
  pub fn new(log2_w: usize, log2_h: usize, xdec: usize, ydec: usize) -> Self {
    let w_scu = 1 << (log2_w - MIN_CU_LOG2);
    let h_scu = 1 << (log2_h - MIN_CU_LOG2);
    let n = w_scu * h_scu;
    let luma = 1 << (log2_w + log2_h);
    let chroma = luma >> (xdec + ydec);
    CuData {
      log2_w,
      log2_h,
      w_scu,
      h_scu,
      xdec,
      ydec,
      split_mode: vec![[SplitMode::NO_SPLIT; MAX_CU_DEPTH]; n],
      pred_mode: vec![PredMode::MODE_INTRA; n],
      skip_flag: vec![false; n],
      mmvd_flag: vec![false; n],
      affine_flag: vec![false; n],
      ipm: vec![[0; 2]; n],
      mv: vec![[MotionVector::default(); REFP_NUM]; n],
      refi: vec![[REFI_INVALID; REFP_NUM]; n],
      mvp_idx: vec![[0; REFP_NUM]; n],
      qp_y: vec![0; n],
      qp_u: vec![0; n],
      qp_v: vec![0; n],
      nnz: vec![[0; PLANES]; n],
      nnz_sub: vec![[[0; MAX_SUB_TB_NUM]; PLANES]; n],
      depth: vec![0; n],
      map_scu: vec![0; n],
      trace: vec![0; n],
      coef: [vec![0; luma], vec![0; chroma], vec![0; chroma]],
      reco: [
        vec![T::cast_from(0); luma],
        vec![T::cast_from(0); chroma],
        vec![T::cast_from(0); chroma],
      ],
    }
  }

  #[inline]
  pub fn width(&self) -> usize {
    1 << self.log2_w
  }

  #[inline]
  pub fn height(&self) -> usize {
    1 << self.log2_h
  }

  /// Block size of plane `p`.
  #[inline]
  pub fn plane_dims(&self, p: usize) -> (usize, usize) {
    if p == 0 {
      (self.width(), self.height())
    } else {
      (self.width() >> self.xdec, self.height() >> self.ydec)
    }
  }

  /// Resets every unit to "nothing decided" at the given plane QPs.
  pub fn init(&mut self, qps: [u8; PLANES]) {
    self.split_mode.fill([SplitMode::NO_SPLIT; MAX_CU_DEPTH]);
    self.pred_mode.fill(PredMode::MODE_INTRA);
    self.skip_flag.fill(false);
    self.mmvd_flag.fill(false);
    self.affine_flag.fill(false);
    self.ipm.fill([0; 2]);
    self.mv.fill([MotionVector::default(); REFP_NUM]);
    self.refi.fill([REFI_INVALID; REFP_NUM]);
    self.mvp_idx.fill([0; REFP_NUM]);
    self.qp_y.fill(qps[0]);
    self.qp_u.fill(qps[1]);
    self.qp_v.fill(qps[2]);
    self.nnz.fill([0; PLANES]);
    self.nnz_sub.fill([[0; MAX_SUB_TB_NUM]; PLANES]);
    self.depth.fill(0);
    self.map_scu.fill(0);
    self.trace.fill(0);
    for p in 0..PLANES {
      self.coef[p].fill(0);
      self.reco[p].fill(T::cast_from(0));
    }
  }

  /// Stores a decided coding unit covering the whole record.
  ///
  /// Only the fields of the planes in `tree_cons` are written: a chroma
  /// coding unit leaves the luma decisions of the record untouched.
  pub fn write_candidate(
    &mut self, cand: &PredictionCandidate<T>, qps: [u8; PLANES],
    depth: usize, tree_cons: TreeCons, serial: u32,
  ) {
    if tree_cons.has_luma() {
      let flags = cand.scu_flags(tree_cons);

      self.pred_mode.fill(cand.pred_mode);
      self.skip_flag.fill(cand.skip);
      self.mmvd_flag.fill(cand.mmvd);
      self.affine_flag.fill(cand.affine);
      self.mv.fill(cand.mv);
      self.refi.fill(cand.refi);
      self.mvp_idx.fill(cand.mvp_idx);
      self.qp_y.fill(qps[0]);
      self.depth.fill(depth as u8);
      self.map_scu.fill(flags);
      self.trace.fill(serial);
      for ipm in self.ipm.iter_mut() {
        ipm[0] = cand.ipm[0];
      }
    } else {
      let cbf_chroma = cand.scu_flags(tree_cons) & SCU_CBF_CHROMA;
      for f in self.map_scu.iter_mut() {
        *f = (*f & !SCU_CBF_CHROMA) | cbf_chroma;
      }
    }

    if tree_cons.has_chroma() {
      self.qp_u.fill(qps[1]);
      self.qp_v.fill(qps[2]);
      for ipm in self.ipm.iter_mut() {
        ipm[1] = cand.ipm[1];
      }
    }

    for p in tree_cons.planes() {
      debug_assert_eq!(cand.dims[p], self.plane_dims(p));
      for (nnz, sub) in self.nnz.iter_mut().zip(self.nnz_sub.iter_mut()) {
        nnz[p] = cand.nnz[p];
        sub[p] = cand.nnz_sub[p];
      }
      self.coef[p].copy_from_slice(&cand.coef[p]);
      self.reco[p].copy_from_slice(&cand.reco[p]);
    }
  }

  /// Records `mode` as the split decision at `depth` for every unit.
  pub fn set_split_mode(&mut self, depth: usize, mode: SplitMode) {
    for s in self.split_mode.iter_mut() {
      s[depth] = mode;
    }
  }

  /// Merges `src`, a smaller record, at luma offset (`off_x`, `off_y`).
  ///
  /// Luma-side metadata moves only when `tree_cons` carries luma and
  /// chroma-side metadata only when it carries chroma.
  pub fn copy_from(
    &mut self, src: &CuData<T>, off_x: usize, off_y: usize,
    tree_cons: TreeCons,
  ) {
    debug_assert!(off_x + src.width() <= self.width());
    debug_assert!(off_y + src.height() <= self.height());
    let (x, y) = (off_x >> MIN_CU_LOG2, off_y >> MIN_CU_LOG2);
    let (w, h) = (src.w_scu, src.h_scu);
    let ds = self.w_scu;
    let ss = src.w_scu;

    macro_rules! merge {
      ($dst:ident, $src:ident; $($field:ident),*) => {
        $(copy_rect(
          &mut $dst.$field, ds, x, y, &$src.$field, ss, 0, 0, w, h,
        );)*
      };
    }

    if tree_cons.has_luma() {
      merge!(
        self, src;
        split_mode,
        pred_mode,
        skip_flag,
        mmvd_flag,
        affine_flag,
        mv,
        refi,
        mvp_idx,
        qp_y,
        depth,
        trace
      );
    }
    if tree_cons.has_chroma() {
      merge!(self, src; qp_u, qp_v);
    }

    let planes = tree_cons.planes();
    for r in 0..h {
      let d = (y + r) * ds + x;
      let s = r * ss;
      for i in 0..w {
        let (dst, src_i) = (d + i, s + i);
        let di = &mut self.ipm[dst];
        let si = &src.ipm[src_i];
        if tree_cons.has_luma() {
          di[0] = si[0];
        }
        if tree_cons.has_chroma() {
          di[1] = si[1];
        }
        for p in planes.clone() {
          self.nnz[dst][p] = src.nnz[src_i][p];
          self.nnz_sub[dst][p] = src.nnz_sub[src_i][p];
        }
        let keep = if tree_cons.has_luma() && tree_cons.has_chroma() {
          0
        } else if tree_cons.has_luma() {
          SCU_CBF_CHROMA
        } else {
          !SCU_CBF_CHROMA
        };
        self.map_scu[dst] =
          (self.map_scu[dst] & keep) | (src.map_scu[src_i] & !keep);
      }
    }

    for p in planes {
      let (xd, yd) = if p == 0 { (0, 0) } else { (self.xdec, self.ydec) };
      let (dw, _) = self.plane_dims(p);
      let (sw, sh) = src.plane_dims(p);
      let (px, py) = (off_x >> xd, off_y >> yd);
      copy_rect(&mut self.coef[p], dw, px, py, &src.coef[p], sw, 0, 0, sw, sh);
      copy_rect(&mut self.reco[p], dw, px, py, &src.reco[p], sw, 0, 0, sw, sh);
    }
  }

  /// Copies the reconstruction of `planes` into the tile frame, for the
  /// record placed at luma position (`x`, `y`).
  pub fn write_reco(
    &self, rec: &mut TileFrame<T>, x: usize, y: usize,
    planes: std::ops::Range<usize>,
  ) {
    for p in planes {
      let (xd, yd) = if p == 0 { (0, 0) } else { (self.xdec, self.ydec) };
      let (w, h) = self.plane_dims(p);
      rec.write_block(p, x >> xd, y >> yd, w, h, &self.reco[p], w);
    }
  }

  /// Scatters the record placed at luma position (`x`, `y`) into `maps`.
  ///
  /// Units are marked coded. `transient` additionally marks them in
  /// progress, for decisions the search may still revise; a final commit
  /// clears that mark.
  pub fn commit_to_frame_maps(
    &self, maps: &mut FrameMaps, x: usize, y: usize, transient: bool,
  ) {
    let node = CodingNode {
      x,
      y,
      log2_w: self.log2_w,
      log2_h: self.log2_h,
      ..CodingNode::root(x, y, self.log2_w)
    };
    let Some((mx, my, w, h)) = maps.clip_node(&node) else { return };
    let (ox, oy) = (
      maps.x_scu + mx - (x >> MIN_CU_LOG2),
      maps.y_scu + my - (y >> MIN_CU_LOG2),
    );
    let mark = SCU_CODED | if transient { SCU_IN_PROGRESS } else { 0 };

    for r in 0..h {
      let d = (my + r) * maps.w_scu + mx;
      let s = (oy + r) * self.w_scu + ox;
      for i in 0..w {
        let (d, s) = (d + i, s + i);
        maps.scu[d] = self.map_scu[s] | mark;
        maps.ipm[d] = self.ipm[s];
        maps.mv[d] = self.mv[s];
        maps.refi[d] = self.refi[s];
        maps.depth[d] = self.depth[s];
        maps.qp[d] = self.qp_y[s];
      }
    }
  }

  /// The coding units of the decided subtree rooted at `node`, restricted
  /// to the picture, in coding order.
  pub fn leaves(
    &self, node: &CodingNode, pic_w: usize, pic_h: usize,
  ) -> Vec<CodingNode> {
    let mut out = Vec::new();
    self.collect_leaves(node, node, pic_w, pic_h, &mut out);
    out
  }

  fn collect_leaves(
    &self, root: &CodingNode, node: &CodingNode, pic_w: usize, pic_h: usize,
    out: &mut Vec<CodingNode>,
  ) {
    let i = ((node.y - root.y) >> MIN_CU_LOG2) * self.w_scu
      + ((node.x - root.x) >> MIN_CU_LOG2);
    if self.split_mode[i][node.depth] == SplitMode::SPLIT_QUAD
      && !node.is_min_size()
    {
      let split = SplitStructure::new(
        node,
        SplitMode::SPLIT_QUAD,
        node.tree_cons,
        pic_w,
        pic_h,
      );
      for child in split.coded_children() {
        self.collect_leaves(root, &child, pic_w, pic_h, out);
      }
    } else {
      out.push(*node);
    }
  }

  /// Every unit of the record inside the picture was written by some
  /// coding unit.
  pub fn is_fully_traced(
    &self, x: usize, y: usize, pic_w: usize, pic_h: usize,
  ) -> bool {
    (0..self.h_scu).all(|r| {
      (0..self.w_scu).all(|c| {
        let (px, py) = (x + (c << MIN_CU_LOG2), y + (r << MIN_CU_LOG2));
        px >= pic_w || py >= pic_h || self.trace[r * self.w_scu + c] != 0
      })
    })
  }
}

#[inline]
const fn pool_index(log2_w: usize, log2_h: usize) -> usize {
  (log2_w - MIN_CU_LOG2) * CU_SIZE_CLASSES + (log2_h - MIN_CU_LOG2)
}

/// Best and in-progress records for every size class up to the CTU size,
/// allocated once per tile.
#[derive(Debug, Clone)]
pub struct CuDataPool<T: Pixel> {
  best: Vec<Option<CuData<T>>>,
  temp: Vec<Option<CuData<T>>>,
  /// Chroma coded once for an 8x8 node split into luma-only 4x4 units.
  chroma: CuData<T>,
}

impl<T: Pixel> CuDataPool<T> {
  pub fn new(max_log2: usize, xdec: usize, ydec: usize) -> Self {
    let n = CU_SIZE_CLASSES * CU_SIZE_CLASSES;
    let mut best = vec![None; n];
    let mut temp = vec![None; n];
    for log2_w in MIN_CU_LOG2..=max_log2 {
      for log2_h in MIN_CU_LOG2..=max_log2 {
        let i = pool_index(log2_w, log2_h);
        best[i] = Some(CuData::new(log2_w, log2_h, xdec, ydec));
        temp[i] = Some(CuData::new(log2_w, log2_h, xdec, ydec));
      }
    }
    let chroma = CuData::new(MIN_CU_LOG2 + 1, MIN_CU_LOG2 + 1, xdec, ydec);
    CuDataPool { best, temp, chroma }
  }

  #[inline]
  fn slot<'a>(
    v: &'a [Option<CuData<T>>], node: &CodingNode,
  ) -> &'a CuData<T> {
    let Some(cu) = &v[pool_index(node.log2_w, node.log2_h)] else {
      panic!("no record for {}x{}", node.width(), node.height());
    };
    cu
  }

  #[inline]
  fn slot_mut<'a>(
    v: &'a mut [Option<CuData<T>>], node: &CodingNode,
  ) -> &'a mut CuData<T> {
    let Some(cu) = &mut v[pool_index(node.log2_w, node.log2_h)] else {
      panic!("no record for {}x{}", node.width(), node.height());
    };
    cu
  }

  pub fn best(&self, node: &CodingNode) -> &CuData<T> {
    Self::slot(&self.best, node)
  }

  pub fn best_mut(&mut self, node: &CodingNode) -> &mut CuData<T> {
    Self::slot_mut(&mut self.best, node)
  }

  pub fn temp(&self, node: &CodingNode) -> &CuData<T> {
    Self::slot(&self.temp, node)
  }

  pub fn temp_mut(&mut self, node: &CodingNode) -> &mut CuData<T> {
    Self::slot_mut(&mut self.temp, node)
  }

  pub fn chroma_mut(&mut self) -> &mut CuData<T> {
    &mut self.chroma
  }

  /// Makes the in-progress record of `node`'s size class the best one.
  pub fn promote_temp(&mut self, node: &CodingNode) {
    let i = pool_index(node.log2_w, node.log2_h);
    std::mem::swap(&mut self.best[i], &mut self.temp[i]);
  }

  /// Merges the best record of `child` into the in-progress record of
  /// `parent`.
  pub fn merge_child(
    &mut self, parent: &CodingNode, child: &CodingNode, tree_cons: TreeCons,
  ) {
    let src = Self::slot(&self.best, child);
    let dst = Self::slot_mut(&mut self.temp, parent);
    dst.copy_from(src, child.x - parent.x, child.y - parent.y, tree_cons);
  }

  /// Merges the chroma-only record into the in-progress record of `parent`.
  pub fn merge_chroma(&mut self, parent: &CodingNode) {
    let dst = Self::slot_mut(&mut self.temp, parent);
    let cons = TreeCons::new(TreeType::CHROMA, ModeCons::INTRA);
    dst.copy_from(&self.chroma, 0, 0, cons);
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::tiling::TileRect;
  use pretty_assertions::assert_eq;

  fn candidate(
    node: &CodingNode, mode: PredMode, luma: u8, chroma: u8,
  ) -> PredictionCandidate<u8> {
    let mut cand = PredictionCandidate::new();
    cand.reset(node, 1, 1);
    cand.pred_mode = mode;
    cand.skip = mode == PredMode::MODE_SKIP;
    cand.ipm = [2, 0];
    for p in 0..PLANES {
      let (w, h) = cand.dims[p];
      let v = if p == 0 { luma } else { chroma };
      cand.reco[p] = vec![v; w * h];
      cand.coef[p] = vec![0; w * h];
    }
    cand.coef[0][0] = 5;
    cand.nnz[0] = 1;
    cand
  }

  fn node(x: usize, y: usize, log2: usize, depth: usize) -> CodingNode {
    CodingNode {
      x,
      y,
      log2_w: log2,
      log2_h: log2,
      depth,
      ..CodingNode::root(0, 0, 6)
    }
  }

  #[test]
  fn write_candidate_fills_the_record() {
    let n = node(0, 0, 3, 3);
    let mut cu = CuData::<u8>::new(3, 3, 1, 1);
    cu.init([30, 31, 32]);
    let cand = candidate(&n, PredMode::MODE_INTRA, 77, 99);
    cu.write_candidate(&cand, [28, 29, 29], 3, n.tree_cons, 7);

    assert_eq!(cu.trace, vec![7; 4]);
    assert_eq!(cu.depth, vec![3; 4]);
    assert_eq!(cu.qp_u, vec![29; 4]);
    assert_eq!(cu.map_scu[3], SCU_INTRA | SCU_CBF_LUMA);
    assert_eq!(cu.reco[1], vec![99; 16]);
    assert!(cu.is_fully_traced(0, 0, 64, 64));
  }

  #[test]
  fn chroma_write_keeps_luma() {
    let n = node(0, 0, 3, 2);
    let mut cu = CuData::<u8>::new(3, 3, 1, 1);
    cu.init([30; PLANES]);
    let luma = TreeCons::new(TreeType::LUMA, ModeCons::INTRA);
    let chroma = TreeCons::new(TreeType::CHROMA, ModeCons::INTRA);
    cu.write_candidate(
      &candidate(&n, PredMode::MODE_INTRA, 10, 0),
      [30; PLANES],
      3,
      luma,
      1,
    );
    let mut cand = candidate(&n, PredMode::MODE_INTRA, 0, 50);
    cand.nnz[1] = 3;
    cu.write_candidate(&cand, [30, 25, 26], 2, chroma, 2);

    assert_eq!(cu.reco[0], vec![10; 64]);
    assert_eq!(cu.reco[1], vec![50; 16]);
    assert_eq!(cu.trace, vec![1; 4]);
    assert_eq!(cu.depth, vec![3; 4]);
    assert_eq!(cu.qp_v, vec![26; 4]);
    assert_eq!(cu.map_scu[0], SCU_INTRA | SCU_CBF_LUMA | SCU_CBF_CHROMA);
  }

  #[test]
  fn copy_respects_offset_and_tree_type() {
    let parent = node(0, 0, 4, 1);
    let child = node(8, 8, 3, 2);
    let mut dst = CuData::<u8>::new(4, 4, 1, 1);
    let mut src = CuData::<u8>::new(3, 3, 1, 1);
    dst.init([30; PLANES]);
    src.init([30; PLANES]);
    src.write_candidate(
      &candidate(&child, PredMode::MODE_SKIP, 40, 60),
      [30; PLANES],
      2,
      child.tree_cons,
      9,
    );

    let luma = TreeCons::new(TreeType::LUMA, ModeCons::ALL);
    dst.copy_from(&src, 8, 8, luma);
    assert_eq!(dst.trace[2 * 4 + 2], 9);
    assert_eq!(dst.trace[2 * 4 + 1], 0);
    assert!(dst.skip_flag[3 * 4 + 3]);
    assert_eq!(dst.reco[0][8 * 16 + 8], 40);
    assert_eq!(dst.reco[0][8 * 16 + 7], 0);
    // Chroma was out of scope.
    assert_eq!(dst.reco[1][4 * 8 + 4], 0);

    dst.copy_from(&src, 8, 8, parent.tree_cons);
    assert_eq!(dst.reco[1][4 * 8 + 4], 60);
    assert_eq!(dst.reco[1][3 * 8 + 3], 0);
    assert_eq!(dst.reco[2][7 * 8 + 7], 60);
  }

  #[test]
  fn leaves_follow_split_history() {
    let root = node(0, 0, 4, 0);
    let mut cu = CuData::<u8>::new(4, 4, 1, 1);
    cu.init([30; PLANES]);
    cu.set_split_mode(0, SplitMode::SPLIT_QUAD);
    // Split the top-left 8x8 once more.
    for (r, c) in [(0, 0), (0, 1), (1, 0), (1, 1)] {
      cu.split_mode[r * 4 + c][1] = SplitMode::SPLIT_QUAD;
    }
    let leaves = cu.leaves(&root, 64, 64);
    let pos: Vec<_> = leaves.iter().map(|n| (n.x, n.y, n.log2_w)).collect();
    assert_eq!(
      pos,
      [
        (0, 0, 2),
        (4, 0, 2),
        (0, 4, 2),
        (4, 4, 2),
        (8, 0, 3),
        (0, 8, 3),
        (8, 8, 3)
      ]
    );
    let area: usize = leaves.iter().map(CodingNode::area).sum();
    assert_eq!(area, root.area());
  }

  #[test]
  fn commit_marks_and_clips() {
    let mut cu = CuData::<u8>::new(4, 4, 1, 1);
    cu.init([33; PLANES]);
    cu.map_scu.fill(SCU_SKIP);
    cu.depth.fill(2);
    let mut maps = FrameMaps::new(2, 0, 4, 4);
    cu.commit_to_frame_maps(&mut maps, 0, 0, true);
    assert_eq!(maps.flags(2, 0), SCU_SKIP | SCU_CODED | SCU_IN_PROGRESS);
    assert_eq!(maps.flags(1, 0), 0);
    assert_eq!(maps.scu[..2], [SCU_SKIP | SCU_CODED | SCU_IN_PROGRESS; 2]);
    assert_eq!(maps.scu[2], 0);

    cu.commit_to_frame_maps(&mut maps, 0, 0, false);
    assert_eq!(maps.flags(3, 3), SCU_SKIP | SCU_CODED);
    assert_eq!(maps.qp[0], 33);
    assert_eq!(maps.depth[maps.w_scu + 1], 2);
  }

  #[test]
  fn reco_lands_in_tile_frame() {
    let mut cu = CuData::<u8>::new(3, 3, 1, 1);
    cu.reco[0].fill(11);
    cu.reco[1].fill(22);
    let rect = TileRect { x: 0, y: 0, width: 16, height: 16 };
    let mut rec = TileFrame::new(&rect, ChromaSampling::Cs420);
    cu.write_reco(&mut rec, 8, 8, 0..PLANES);
    assert_eq!(rec.p(0, 8, 8), 11);
    assert_eq!(rec.p(0, 7, 8), 128);
    assert_eq!(rec.p(1, 4, 4), 22);
    assert_eq!(rec.p(2, 4, 4), 0);
  }

  #[test]
  fn pool_promote_and_merge() {
    let mut pool = CuDataPool::<u8>::new(5, 1, 1);
    let parent = node(0, 0, 4, 1);
    let child = node(8, 0, 3, 2);
    pool.temp_mut(&parent).init([30; PLANES]);
    let cand = candidate(&child, PredMode::MODE_INTER, 12, 34);
    pool.temp_mut(&child).write_candidate(
      &cand,
      [30; PLANES],
      2,
      child.tree_cons,
      4,
    );
    pool.promote_temp(&child);
    assert_eq!(pool.best(&child).trace[0], 4);
    pool.merge_child(&parent, &child, child.tree_cons);
    assert_eq!(pool.temp(&parent).trace[2], 4);
    assert_eq!(pool.temp(&parent).reco[0][8], 12);

    pool.chroma_mut().reco[1].fill(90);
    let small = node(0, 0, 3, 1);
    pool.temp_mut(&small).init([30; PLANES]);
    pool.merge_chroma(&small);
    assert_eq!(pool.temp(&small).reco[1], vec![90; 16]);
    assert_eq!(pool.temp(&small).reco[0], vec![0; 64]);
  }
}
