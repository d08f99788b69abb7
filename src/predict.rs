// Copyright (c) 2017-2022, The evce contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! Prediction analyzers: the intra and inter searches the mode decision
//! delegates to.
//!
//! An analyzer looks at one coding node and proposes its best candidate:
//! prediction parameters, the syntax elements that signal them, quantized
//! coefficients and the resulting reconstruction. Rate-distortion costing
//! of the proposal is left to the caller, which owns the entropy state.

use crate::context::neighbor::*;
use crate::context::Symbol;
use crate::deblock::{DeblockFilter, SimpleDeblockFilter};
use crate::dist::*;
use crate::frame::*;
use crate::partition::*;
use crate::quantize::quantize_block;
use crate::tiling::TileFrame;
use crate::util::*;

use arrayvec::ArrayVec;
use std::fmt;
use std::sync::Arc;

pub const INTRA_DC: u8 = 0;
pub const INTRA_HOR: u8 = 1;
pub const INTRA_VER: u8 = 2;

/// Most syntax elements a single candidate signals.
pub const MAX_MODE_SYMBOLS: usize = 16;
/// Largest number of motion vector predictor candidates.
pub const MAX_MVP_NUM: usize = 3;

/// A proposed coding of one node.
#[derive(Debug, Clone)]
pub struct PredictionCandidate<T: Pixel> {
  pub pred_mode: PredMode,
  pub skip: bool,
  pub mmvd: bool,
  pub affine: bool,
  /// Luma and chroma intra directions.
  pub ipm: [u8; 2],
  pub mv: [MotionVector; REFP_NUM],
  pub refi: [i8; REFP_NUM],
  pub mvp_idx: [u8; REFP_NUM],
  /// Mode syntax, in coding order. Residual syntax is derived from `coef`.
  pub syntax: ArrayVec<Symbol, MAX_MODE_SYMBOLS>,
  /// Luma SATD between source and prediction.
  pub satd: u32,
  /// Block size of each plane.
  pub dims: [(usize, usize); PLANES],
  pub nnz: [u32; PLANES],
  pub nnz_sub: [[u32; MAX_SUB_TB_NUM]; PLANES],
  pub coef: [Vec<i32>; PLANES],
  pub reco: [Vec<T>; PLANES],
  /// Analyzer workspace.
  pub pred: [Vec<T>; PLANES],
}

impl<T: Pixel> PredictionCandidate<T> {
  pub fn new() -> Self {
    PredictionCandidate {
      pred_mode: PredMode::MODE_INTRA,
      skip: false,
      mmvd: false,
      affine: false,
      ipm: [0; 2],
      mv: [MotionVector::default(); REFP_NUM],
      refi: [REFI_INVALID; REFP_NUM],
      mvp_idx: [0; REFP_NUM],
      syntax: ArrayVec::new(),
      satd: 0,
      dims: [(0, 0); PLANES],
      nnz: [0; PLANES],
      nnz_sub: [[0; MAX_SUB_TB_NUM]; PLANES],
      coef: [Vec::new(), Vec::new(), Vec::new()],
      reco: [Vec::new(), Vec::new(), Vec::new()],
      pred: [Vec::new(), Vec::new(), Vec::new()],
    }
  }

  /// Clears the candidate for `node`, keeping buffer capacity.
  pub fn reset(&mut self, node: &CodingNode, xdec: usize, ydec: usize) {
    self.pred_mode = PredMode::MODE_INTRA;
    self.skip = false;
    self.mmvd = false;
    self.affine = false;
    self.ipm = [0; 2];
    self.mv = [MotionVector::default(); REFP_NUM];
    self.refi = [REFI_INVALID; REFP_NUM];
    self.mvp_idx = [0; REFP_NUM];
    self.syntax.clear();
    self.satd = 0;
    self.nnz = [0; PLANES];
    self.nnz_sub = [[0; MAX_SUB_TB_NUM]; PLANES];
    for p in 0..PLANES {
      let (xd, yd) = if p == 0 { (0, 0) } else { (xdec, ydec) };
      self.dims[p] = (node.width() >> xd, node.height() >> yd);
      self.coef[p].clear();
      self.reco[p].clear();
      self.pred[p].clear();
    }
  }

  /// Codes plane `p` as prediction plus quantized residual.
  fn code_residual(
    &mut self, src: &Frame<T>, p: usize, x: usize, y: usize, qp: u8,
    bit_depth: usize,
  ) {
    let (w, h) = self.dims[p];
    let (org, stride) = src.block(p, x, y);
    self.nnz[p] = quantize_block(
      org,
      stride,
      &self.pred[p],
      w,
      h,
      qp,
      bit_depth,
      &mut self.coef[p],
      &mut self.reco[p],
    );
    self.count_sub_nnz(p);
  }

  /// Codes plane `p` as its prediction, without residual.
  fn code_prediction_only(&mut self, p: usize) {
    let (w, h) = self.dims[p];
    self.coef[p].clear();
    self.coef[p].resize(w * h, 0);
    self.reco[p].clone_from(&self.pred[p]);
    self.nnz[p] = 0;
    self.nnz_sub[p] = [0; MAX_SUB_TB_NUM];
  }

  /// `SCU_*` flags of a coding unit coded with this candidate, without the
  /// coded bit.
  pub fn scu_flags(&self, tree_cons: TreeCons) -> u32 {
    let mut flags = 0;
    if self.pred_mode.is_intra() {
      flags |= SCU_INTRA;
    }
    if self.skip {
      flags |= SCU_SKIP;
    }
    if self.pred_mode == PredMode::MODE_IBC {
      flags |= SCU_IBC;
    }
    if self.mmvd {
      flags |= SCU_MMVD;
    }
    if self.affine {
      flags |= SCU_AFFINE;
    }
    if tree_cons.has_luma() && self.nnz[0] > 0 {
      flags |= SCU_CBF_LUMA;
    }
    if tree_cons.has_chroma() && self.nnz[1] + self.nnz[2] > 0 {
      flags |= SCU_CBF_CHROMA;
    }
    flags
  }

  /// Splits the non-zero count of plane `p` over its transform blocks.
  fn count_sub_nnz(&mut self, p: usize) {
    let (w, h) = self.dims[p];
    let max_tr = if p == 0 {
      1 << MAX_TR_LOG2
    } else {
      (1 << MAX_TR_LOG2) * w / self.dims[0].0
    };
    let (tw, th) = (w.min(max_tr), h.min(max_tr));
    let cols = w / tw;
    self.nnz_sub[p] = [0; MAX_SUB_TB_NUM];
    for (i, &c) in self.coef[p].iter().enumerate() {
      if c != 0 {
        let (r, col) = (i / w, i % w);
        self.nnz_sub[p][(r / th) * cols + col / tw] += 1;
      }
    }
  }
}

/// Everything an analyzer may look at for one node.
#[derive(Debug, Clone, Copy)]
pub struct AnalysisRequest<'a, T: Pixel> {
  pub node: CodingNode,
  /// Effective QP of each plane.
  pub qps: [u8; PLANES],
  pub lambda: f64,
  /// `AVAIL_*` mask of the neighbors usable for this prediction family.
  pub avail: u16,
  pub ctx: ContextFlags,
  pub slice_type: SliceType,
  pub bit_depth: usize,
  pub src: &'a Frame<T>,
  pub refs: &'a [Option<Arc<Frame<T>>>; REFP_NUM],
  /// Reconstruction of the tile, coded neighbors included.
  pub rec: &'a TileFrame<T>,
  pub maps: &'a FrameMaps,
}

impl<'a, T: Pixel> AnalysisRequest<'a, T> {
  #[inline]
  fn decimation(&self, p: usize) -> (usize, usize) {
    let cfg = &self.src.planes[p].cfg;
    (cfg.xdec, cfg.ydec)
  }

  /// Block position of the node in plane `p`.
  #[inline]
  fn plane_pos(&self, p: usize) -> (usize, usize) {
    let (xdec, ydec) = self.decimation(p);
    (self.node.x >> xdec, self.node.y >> ydec)
  }
}

pub trait InterAnalyzer<T: Pixel>: Send + Sync {
  /// Proposes the best inter candidate for `req.node` in `cand`. Returns
  /// `false` when inter prediction is impossible, e.g. without references.
  fn analyze(
    &self, req: &AnalysisRequest<'_, T>, cand: &mut PredictionCandidate<T>,
  ) -> bool;
}

pub trait IntraAnalyzer<T: Pixel>: Send + Sync {
  /// Proposes the best intra candidate for `req.node` in `cand`, for the
  /// planes of the node's tree type.
  fn analyze(
    &self, req: &AnalysisRequest<'_, T>, cand: &mut PredictionCandidate<T>,
  ) -> bool;
}

/// The external units the search delegates to, resolved once per encoder.
#[derive(Clone)]
pub struct Analyzers<T: Pixel> {
  pub inter: Arc<dyn InterAnalyzer<T>>,
  pub intra: Arc<dyn IntraAnalyzer<T>>,
  pub deblock: Arc<dyn DeblockFilter<T>>,
}

impl<T: Pixel> Default for Analyzers<T> {
  fn default() -> Self {
    Analyzers {
      inter: Arc::new(BasicInterAnalyzer::default()),
      intra: Arc::new(BasicIntraAnalyzer),
      deblock: Arc::new(SimpleDeblockFilter),
    }
  }
}

impl<T: Pixel> fmt::Debug for Analyzers<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Analyzers").finish_non_exhaustive()
  }
}

/// DC, horizontal and vertical prediction from the reconstructed
/// neighbors. Unavailable neighbors read as mid-grey.
pub fn predict_intra<T: Pixel>(
  mode: u8, rec: &TileFrame<T>, p: usize, x: usize, y: usize, w: usize,
  h: usize, avail: u16, bit_depth: usize, out: &mut Vec<T>,
) {
  let base = 1i32 << (bit_depth - 1);
  let has_left = avail & AVAIL_LE != 0;
  let has_top = avail & AVAIL_UP != 0;
  let left = |r: usize| {
    if has_left {
      i32::cast_from(rec.p(p, x - 1, y + r))
    } else {
      base
    }
  };
  let top = |c: usize| {
    if has_top {
      i32::cast_from(rec.p(p, x + c, y - 1))
    } else {
      base
    }
  };

  out.clear();
  match mode {
    INTRA_HOR => {
      for r in 0..h {
        let v = T::cast_from(left(r));
        out.extend(std::iter::repeat(v).take(w));
      }
    }
    INTRA_VER => {
      let row: ArrayVec<T, MAX_CU_SIZE> =
        (0..w).map(|c| T::cast_from(top(c))).collect();
      for _ in 0..h {
        out.extend_from_slice(&row);
      }
    }
    _ => {
      let (sum, n) = match (has_left, has_top) {
        (true, true) => (
          (0..h).map(left).sum::<i32>() + (0..w).map(top).sum::<i32>(),
          w + h,
        ),
        (true, false) => ((0..h).map(left).sum(), h),
        (false, true) => ((0..w).map(top).sum(), w),
        (false, false) => (base, 1),
      };
      let dc = (sum + (n as i32 >> 1)) / n as i32;
      out.resize(w * h, T::cast_from(dc));
    }
  }
}

/// Full-pel motion compensated prediction with edge clamping.
pub fn predict_inter<T: Pixel>(
  refp: &Frame<T>, p: usize, x: usize, y: usize, w: usize, h: usize,
  mv: MotionVector, out: &mut Vec<T>,
) {
  let plane = &refp.planes[p];
  let (xdec, ydec) = (plane.cfg.xdec, plane.cfg.ydec);
  let (pw, ph) = (plane.cfg.width as isize, plane.cfg.height as isize);
  let dx = (mv.col as isize >> 2) >> xdec;
  let dy = (mv.row as isize >> 2) >> ydec;

  out.clear();
  for r in 0..h as isize {
    let sy = clamp(y as isize + r + dy, 0, ph - 1) as usize;
    for c in 0..w as isize {
      let sx = clamp(x as isize + c + dx, 0, pw - 1) as usize;
      out.push(plane.p(sx, sy));
    }
  }
}

/// Motion search over the neighbors' vectors with a small full-pel
/// refinement, choosing between skip and coded residual.
#[derive(Debug, Clone, Copy)]
pub struct BasicInterAnalyzer {
  /// Rounds of one-pel refinement around the best predictor.
  pub refine_steps: usize,
}

impl Default for BasicInterAnalyzer {
  fn default() -> Self {
    BasicInterAnalyzer { refine_steps: 2 }
  }
}

impl BasicInterAnalyzer {
  /// Motion vector predictors from the left, above and above-right
  /// neighbors, padded with the zero vector.
  fn mvp_list<T: Pixel>(
    req: &AnalysisRequest<'_, T>, list: usize,
  ) -> ArrayVec<MotionVector, MAX_MVP_NUM> {
    let node = &req.node;
    let (x, y) =
      ((node.x >> MIN_CU_LOG2) as isize, (node.y >> MIN_CU_LOG2) as isize);
    let w = (node.width() >> MIN_CU_LOG2) as isize;
    let positions = [
      (AVAIL_LE, x - 1, y),
      (AVAIL_UP, x, y - 1),
      (AVAIL_UP_RI, x + w, y - 1),
    ];

    let mut mvps = ArrayVec::new();
    for (bit, px, py) in positions {
      if req.avail & bit == 0 {
        continue;
      }
      let Some(i) = req.maps.idx(px, py) else { continue };
      if req.maps.refi[i][list] < 0 {
        continue;
      }
      let mv = req.maps.mv[i][list].quantize_to_fullpel();
      if !mvps.contains(&mv) && !mvps.is_full() {
        mvps.push(mv);
      }
    }
    if !mvps.contains(&MotionVector::default()) && !mvps.is_full() {
      mvps.push(MotionVector::default());
    }
    mvps
  }

  fn luma_sad<T: Pixel>(
    req: &AnalysisRequest<'_, T>, refp: &Frame<T>, mv: MotionVector,
    buf: &mut Vec<T>,
  ) -> u32 {
    let node = &req.node;
    let (w, h) = (node.width(), node.height());
    predict_inter(refp, 0, node.x, node.y, w, h, mv, buf);
    let (org, stride) = req.src.block(0, node.x, node.y);
    get_sad(org, stride, buf, w, w, h)
  }
}

impl<T: Pixel> InterAnalyzer<T> for BasicInterAnalyzer {
  fn analyze(
    &self, req: &AnalysisRequest<'_, T>, cand: &mut PredictionCandidate<T>,
  ) -> bool {
    let lists = if req.slice_type == SliceType::B { REFP_NUM } else { 1 };
    let mut best: Option<(u32, usize, MotionVector)> = None;
    let mut buf = std::mem::take(&mut cand.pred[0]);

    for list in 0..lists {
      let Some(refp) = req.refs[list].as_deref() else { continue };
      let mvps = Self::mvp_list(req, list);
      let mut list_best = (u32::MAX, MotionVector::default());
      for &mv in &mvps {
        let sad = Self::luma_sad(req, refp, mv, &mut buf);
        if sad < list_best.0 {
          list_best = (sad, mv);
        }
      }
      for _ in 0..self.refine_steps {
        let center = list_best.1;
        for (dr, dc) in [(-4, 0), (0, -4), (0, 4), (4, 0)] {
          let mv = MotionVector { row: center.row + dr, col: center.col + dc };
          let sad = Self::luma_sad(req, refp, mv, &mut buf);
          if sad < list_best.0 {
            list_best = (sad, mv);
          }
        }
        if list_best.1 == center {
          break;
        }
      }
      if best.map_or(true, |(sad, ..)| list_best.0 < sad) {
        best = Some((list_best.0, list, list_best.1));
      }
    }
    cand.pred[0] = buf;

    let Some((_, list, mv)) = best else { return false };
    let Some(refp) = req.refs[list].as_deref() else { return false };
    let mvps = Self::mvp_list(req, list);
    let (mvp_idx, mvp) = mvps
      .iter()
      .enumerate()
      .min_by_key(|(_, p)| {
        (p.col as i32 - mv.col as i32).abs()
          + (p.row as i32 - mv.row as i32).abs()
      })
      .map_or((0, MotionVector::default()), |(i, &p)| (i, p));

    let (xdec, ydec) = req.decimation(1);
    cand.reset(&req.node, xdec, ydec);
    cand.pred_mode = PredMode::MODE_INTER;
    cand.mv[list] = mv;
    cand.refi[list] = 0;
    cand.mvp_idx[list] = mvp_idx as u8;

    let planes = req.node.tree_cons.planes();
    for p in planes.clone() {
      let (x, y) = req.plane_pos(p);
      let (w, h) = cand.dims[p];
      predict_inter(refp, p, x, y, w, h, mv, &mut cand.pred[p]);
    }
    let (org, stride) = req.src.block(0, req.node.x, req.node.y);
    let (w, h) = cand.dims[0];
    cand.satd = get_satd(org, stride, &cand.pred[0], w, w, h);

    // Skip reuses the predictor as is and codes nothing else.
    let mut skip_dist = 0u64;
    let mut res_dist = 0u64;
    let mut res_nnz = 0u32;
    for p in planes.clone() {
      let (x, y) = req.plane_pos(p);
      let (w, h) = cand.dims[p];
      let (org, stride) = req.src.block(p, x, y);
      skip_dist += get_ssd(org, stride, &cand.pred[p], w, w, h);
      cand.code_residual(req.src, p, x, y, req.qps[p], req.bit_depth);
      res_dist += get_ssd(org, stride, &cand.reco[p], w, w, h);
      res_nnz += cand.nnz[p];
    }

    // Rough rate: a few bits per level plus the coded-block flags.
    let res_cost =
      res_dist as f64 + req.lambda * (4 * res_nnz + PLANES as u32) as f64;
    let skip = mv == mvp && (skip_dist as f64) <= res_cost;

    let mvd = mv - mvp;
    if skip {
      cand.pred_mode = PredMode::MODE_SKIP;
      cand.skip = true;
      for p in planes {
        cand.code_prediction_only(p);
      }
      cand.syntax.push(Symbol::SkipFlag { ctx: req.ctx.skip, skip: true });
      cand.syntax.push(Symbol::MvpIdx { idx: mvp_idx as u8 });
    } else {
      cand.syntax.push(Symbol::SkipFlag { ctx: req.ctx.skip, skip: false });
      cand
        .syntax
        .push(Symbol::PredMode { ctx: req.ctx.pred_mode, intra: false });
      cand.syntax.push(Symbol::MvpIdx { idx: mvp_idx as u8 });
      cand.syntax.push(Symbol::Mvd { value: mvd.col });
      cand.syntax.push(Symbol::Mvd { value: mvd.row });
    }
    true
  }
}

/// DC, horizontal and vertical luma prediction chosen by SATD; chroma is
/// always DC.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicIntraAnalyzer;

impl<T: Pixel> IntraAnalyzer<T> for BasicIntraAnalyzer {
  fn analyze(
    &self, req: &AnalysisRequest<'_, T>, cand: &mut PredictionCandidate<T>,
  ) -> bool {
    let (xdec, ydec) = req.decimation(1);
    cand.reset(&req.node, xdec, ydec);
    cand.pred_mode = PredMode::MODE_INTRA;
    let cons = req.node.tree_cons;

    if cons.has_luma() {
      let (x, y) = req.plane_pos(0);
      let (w, h) = cand.dims[0];
      let (org, stride) = req.src.block(0, x, y);
      let mut best = (u32::MAX, INTRA_DC);
      for mode in [INTRA_DC, INTRA_HOR, INTRA_VER] {
        predict_intra(
          mode,
          req.rec,
          0,
          x,
          y,
          w,
          h,
          req.avail,
          req.bit_depth,
          &mut cand.pred[0],
        );
        let satd = get_satd(org, stride, &cand.pred[0], w, w, h);
        if satd < best.0 {
          best = (satd, mode);
        }
      }
      cand.ipm[0] = best.1;
      cand.satd = best.0;
    }

    for p in cons.planes() {
      let (x, y) = req.plane_pos(p);
      let (w, h) = cand.dims[p];
      let mode = if p == 0 { cand.ipm[0] } else { INTRA_DC };
      predict_intra(
        mode,
        req.rec,
        p,
        x,
        y,
        w,
        h,
        req.avail,
        req.bit_depth,
        &mut cand.pred[p],
      );
      cand.code_residual(req.src, p, x, y, req.qps[p], req.bit_depth);
    }

    if !req.slice_type.is_intra() && cons.mode_cons == ModeCons::ALL {
      cand.syntax.push(Symbol::SkipFlag { ctx: req.ctx.skip, skip: false });
      cand
        .syntax
        .push(Symbol::PredMode { ctx: req.ctx.pred_mode, intra: true });
    }
    if cons.has_luma() {
      cand.syntax.push(Symbol::IntraDir { luma: true, mode: cand.ipm[0] });
    }
    if cons.has_chroma() {
      cand.syntax.push(Symbol::IntraDir { luma: false, mode: cand.ipm[1] });
    }
    true
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::tiling::TileRect;

  struct Fixture {
    src: Frame<u8>,
    refs: [Option<Arc<Frame<u8>>>; REFP_NUM],
    rec: TileFrame<u8>,
    maps: FrameMaps,
  }

  impl Fixture {
    fn new(src_value: u8, ref_value: u8) -> Self {
      let cs = ChromaSampling::Cs420;
      let mut src = Frame::new(64, 64, cs);
      src.fill(src_value);
      let mut refp = Frame::new(64, 64, cs);
      refp.fill(ref_value);
      let rect = TileRect { x: 0, y: 0, width: 64, height: 64 };
      Fixture {
        src,
        refs: [Some(Arc::new(refp)), None],
        rec: TileFrame::new(&rect, cs),
        maps: FrameMaps::for_picture(64, 64),
      }
    }

    fn request(
      &self, node: CodingNode, slice: SliceType,
    ) -> AnalysisRequest<'_, u8> {
      AnalysisRequest {
        node,
        qps: [32; PLANES],
        lambda: 30.,
        avail: 0,
        ctx: ContextFlags::default(),
        slice_type: slice,
        bit_depth: 8,
        src: &self.src,
        refs: &self.refs,
        rec: &self.rec,
        maps: &self.maps,
      }
    }
  }

  #[test]
  fn identical_reference_is_skip() {
    let f = Fixture::new(90, 90);
    let node =
      CodingNode { log2_w: 4, log2_h: 4, ..CodingNode::root(16, 16, 6) };
    let mut cand = PredictionCandidate::new();
    assert!(BasicInterAnalyzer::default().analyze(
      &f.request(node, SliceType::P),
      &mut cand
    ));
    assert!(cand.skip);
    assert_eq!(cand.pred_mode, PredMode::MODE_SKIP);
    assert_eq!(cand.nnz, [0; PLANES]);
    assert_eq!(cand.reco[0], vec![90; 256]);
    assert_eq!(cand.reco[1].len(), 64);
    assert_eq!(cand.refi, [0, REFI_INVALID]);
    assert_eq!(cand.syntax.len(), 2);
  }

  #[test]
  fn no_reference_no_inter() {
    let mut f = Fixture::new(90, 90);
    f.refs = [None, None];
    let node = CodingNode::root(0, 0, 6);
    let mut cand = PredictionCandidate::new();
    assert!(!BasicInterAnalyzer::default()
      .analyze(&f.request(node, SliceType::P), &mut cand));
  }

  #[test]
  fn intra_codes_residual_against_grey() {
    let f = Fixture::new(200, 0);
    let node =
      CodingNode { log2_w: 3, log2_h: 3, ..CodingNode::root(0, 0, 6) };
    let mut cand = PredictionCandidate::new();
    let req = f.request(node, SliceType::I);
    assert!(BasicIntraAnalyzer.analyze(&req, &mut cand));
    assert_eq!(cand.pred_mode, PredMode::MODE_INTRA);
    assert_eq!(cand.nnz, [64, 16, 16]);
    assert_eq!(cand.nnz_sub[0], [64, 0, 0, 0]);
    // I slices signal neither skip nor prediction mode.
    assert_eq!(
      cand.syntax.as_slice(),
      &[
        Symbol::IntraDir { luma: true, mode: INTRA_DC },
        Symbol::IntraDir { luma: false, mode: 0 }
      ]
    );
  }

  #[test]
  fn chroma_only_intra_leaves_luma_alone() {
    let f = Fixture::new(200, 0);
    let cons = TreeCons::new(TreeType::CHROMA, ModeCons::INTRA);
    let node =
      CodingNode { log2_w: 3, log2_h: 3, ..CodingNode::root(0, 0, 6) }
        .with_tree_cons(cons);
    let mut cand = PredictionCandidate::new();
    BasicIntraAnalyzer.analyze(&f.request(node, SliceType::P), &mut cand);
    assert!(cand.reco[0].is_empty());
    assert_eq!(cand.reco[1].len(), 16);
    assert_eq!(
      cand.syntax.as_slice(),
      &[Symbol::IntraDir { luma: false, mode: 0 }]
    );
  }

  #[test]
  fn intra_prediction_uses_neighbors() {
    let mut f = Fixture::new(0, 0);
    f.rec.frame.fill(10);
    let block = [50u8; 4];
    f.rec.write_block(0, 3, 4, 1, 4, &block, 1);
    let mut out = Vec::new();
    predict_intra(INTRA_HOR, &f.rec, 0, 4, 4, 4, 4, AVAIL_LE, 8, &mut out);
    assert_eq!(out, vec![50; 16]);
    let avail = AVAIL_UP | AVAIL_LE;
    predict_intra(INTRA_DC, &f.rec, 0, 4, 4, 4, 4, avail, 8, &mut out);
    assert_eq!(out, vec![30; 16]);
    predict_intra(INTRA_VER, &f.rec, 0, 4, 4, 4, 4, 0, 8, &mut out);
    assert_eq!(out, vec![128; 16]);
  }

  #[test]
  fn large_blocks_count_sub_transforms() {
    let mut cand = PredictionCandidate::<u8>::new();
    let node = CodingNode::root(0, 0, 7);
    cand.reset(&node, 1, 1);
    cand.coef[0] = vec![0; 128 * 128];
    cand.coef[0][0] = 1;
    cand.coef[0][127 * 128 + 127] = 3;
    cand.coef[0][64] = -1;
    cand.count_sub_nnz(0);
    assert_eq!(cand.nnz_sub[0], [1, 1, 0, 1]);
    cand.coef[1] = vec![0; 64 * 64];
    cand.coef[1][63 * 64] = 2;
    cand.count_sub_nnz(1);
    assert_eq!(cand.nnz_sub[1], [0, 0, 1, 0]);
  }
}
