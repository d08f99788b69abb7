// Copyright (c) 2018-2022, The evce contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

pub mod cu_data;
pub mod partition;

use crate::api::EncoderConfig;
use crate::context::*;
use crate::partition::*;
use crate::predict::Analyzers;
use crate::quantize::*;
use crate::rdo::RdoScratch;
use crate::stats::SearchStats;
use crate::tiling::TileState;
use crate::util::*;

use self::cu_data::{CuData, CuDataPool};
use self::partition::{search_partition, NodePermissions};

use std::mem;
use std::sync::Arc;

/// Picture-level parameters shared by every tile.
#[derive(Debug, Clone)]
pub struct FrameInvariants {
  pub config: Arc<EncoderConfig>,
  pub width: usize,
  pub height: usize,
  pub bit_depth: usize,
  pub xdec: usize,
  pub ydec: usize,
  pub log2_ctu: usize,
  pub slice_type: SliceType,
  pub qp_tables: QpTables,
  pub dqp: DqpParams,
  /// Only kept when adaptive QP is enabled.
  pub qp_offsets: Option<Arc<QpOffsetMap>>,
}

impl FrameInvariants {
  pub fn new(
    config: Arc<EncoderConfig>, slice_type: SliceType, qp: u8,
    qp_offsets: Option<Arc<QpOffsetMap>>,
  ) -> Self {
    let Some((xdec, ydec)) = config.chroma_sampling.get_decimation() else {
      panic!("chroma sampling {:?} is not supported", config.chroma_sampling);
    };
    let qp = clamp_qp(qp as i32);
    let qp_tables = QpTables::new(
      config.bit_depth,
      config.chroma_qp_offset,
      xdec + ydec > 0,
    );
    let dqp = DqpParams {
      tile_qp: qp,
      enabled: config.cu_qp_delta,
      area_log2: config.cu_qp_delta_area,
      max_delta: config.max_dqp,
    };

    FrameInvariants {
      width: config.width,
      height: config.height,
      bit_depth: config.bit_depth,
      xdec,
      ydec,
      log2_ctu: config.ctu_log2,
      slice_type,
      qp_tables,
      dqp,
      qp_offsets: qp_offsets.filter(|_| config.adaptive_qp),
      config,
    }
  }
}

/// Per-tile working memory of the search, allocated once.
#[derive(Debug, Clone)]
pub struct SearchScratch<T: Pixel> {
  pub pool: CuDataPool<T>,
  pub rdo: RdoScratch<T>,
  /// Statistics of the CTU being searched.
  pub stats: SearchStats,
  /// Serial number of the last coding unit written.
  pub serial: u32,
}

impl<T: Pixel> SearchScratch<T> {
  pub fn new(fi: &FrameInvariants) -> Self {
    SearchScratch {
      pool: CuDataPool::new(fi.log2_ctu, fi.xdec, fi.ydec),
      rdo: RdoScratch::new(),
      stats: SearchStats::default(),
      serial: 0,
    }
  }
}

/// Committed decision of one CTU.
#[derive(Debug, Clone)]
pub struct CtuDecision<T: Pixel> {
  pub x: usize,
  pub y: usize,
  pub cost: f64,
  /// Split decision at the root.
  pub split: SplitMode,
  pub stats: SearchStats,
  pub cu: CuData<T>,
}

impl<T: Pixel> CtuDecision<T> {
  pub fn root(&self) -> CodingNode {
    CodingNode::root(self.x, self.y, self.cu.log2_w)
  }

  /// Coding units of the CTU inside the picture, in coding order.
  pub fn leaves(&self, pic_w: usize, pic_h: usize) -> Vec<CodingNode> {
    self.cu.leaves(&self.root(), pic_w, pic_h)
  }

  /// Prediction mode of the coding unit covering luma (`x`, `y`).
  pub fn pred_mode_at(&self, x: usize, y: usize) -> PredMode {
    let c = (x - self.x) >> MIN_CU_LOG2;
    let r = (y - self.y) >> MIN_CU_LOG2;
    self.cu.pred_mode[r * self.cu.w_scu + c]
  }
}

/// Searches the CTU with top-left luma sample (`x`, `y`) and commits its
/// decision to the tile maps.
pub fn search_ctu<T: Pixel, E: EntropyEstimator>(
  fi: &FrameInvariants, tools: &Analyzers<T>, ts: &mut TileState<'_, T>,
  sc: &mut SearchScratch<T>, est: &mut E, x: usize, y: usize,
  dqp: &mut DqpState,
) -> CtuDecision<T> {
  let node = CodingNode::root(x, y, fi.log2_ctu);
  sc.stats = SearchStats::default();

  let nd = search_partition(
    fi,
    tools,
    ts,
    sc,
    est,
    &node,
    fi.dqp.tile_qp,
    *dqp,
    NodePermissions::ALL,
  );
  *dqp = nd.dqp;

  let cu = sc.pool.best(&node);
  debug_assert!(
    cu.is_fully_traced(x, y, fi.width, fi.height),
    "CTU ({}, {}) has uncoded units",
    x,
    y
  );
  cu.commit_to_frame_maps(&mut ts.maps, x, y, false);

  let mut stats = mem::take(&mut sc.stats);
  for leaf in cu.leaves(&node, fi.width, fi.height) {
    let c = (leaf.x - x) >> MIN_CU_LOG2;
    let r = (leaf.y - y) >> MIN_CU_LOG2;
    let (w, h) = leaf.clipped_size(fi.width, fi.height);
    stats.count_cu(&leaf, cu.pred_mode[r * cu.w_scu + c], w * h);
  }

  log::debug!(
    "CTU ({}, {}): cost {:.1}, {:?}, root mode {:?}",
    x,
    y,
    nd.cost,
    nd.split,
    cu.pred_mode[0]
  );

  CtuDecision { x, y, cost: nd.cost, split: nd.split, stats, cu: cu.clone() }
}

/// Searches every CTU of the tile in raster order.
#[profiling::function]
pub fn encode_tile<T: Pixel, E: EntropyEstimator>(
  fi: &FrameInvariants, tools: &Analyzers<T>, ts: &mut TileState<'_, T>,
  est: &mut E,
) -> Vec<CtuDecision<T>> {
  let mut sc = SearchScratch::new(fi);
  let mut dqp = DqpState::new(fi.dqp.tile_qp);
  let ctu_size = 1 << fi.log2_ctu;
  let rect = ts.rect;

  let mut ctus = Vec::new();
  for y in (rect.y..rect.y + rect.height).step_by(ctu_size) {
    for x in (rect.x..rect.x + rect.width).step_by(ctu_size) {
      ctus.push(search_ctu(fi, tools, ts, &mut sc, est, x, y, &mut dqp));
    }
  }
  ctus
}

#[cfg(test)]
pub(crate) mod test {
  use super::*;
  use crate::frame::*;
  use crate::tiling::TileRect;
  use rand::{Rng, SeedableRng};
  use rand_chacha::ChaCha8Rng;

  pub(crate) fn frame_invariants(
    enc: &EncoderConfig, slice_type: SliceType,
  ) -> FrameInvariants {
    FrameInvariants::new(Arc::new(enc.clone()), slice_type, enc.base_qp, None)
  }

  pub(crate) fn flat_pictures(
    enc: &EncoderConfig, src_value: u8, ref_value: u8,
  ) -> (Frame<u8>, [Option<Arc<Frame<u8>>>; REFP_NUM]) {
    let mut src = Frame::new(enc.width, enc.height, enc.chroma_sampling);
    src.fill(src_value);
    let mut refp = Frame::new(enc.width, enc.height, enc.chroma_sampling);
    refp.fill(ref_value);
    (src, [Some(Arc::new(refp)), None])
  }

  /// A gradient with noise on top, reproducible from `seed`.
  pub(crate) fn random_picture(enc: &EncoderConfig, seed: u64) -> Frame<u8> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut frame = Frame::new(enc.width, enc.height, enc.chroma_sampling);
    for plane in frame.planes.iter_mut() {
      let (w, h) = (plane.cfg.width, plane.cfg.height);
      let stride = plane.cfg.stride;
      let data = plane.data_origin_mut();
      for (y, row) in data.chunks_mut(stride).take(h).enumerate() {
        for (x, px) in row[..w].iter_mut().enumerate() {
          *px = ((x + 2 * y) % 192) as u8 + rng.gen_range(0..48);
        }
      }
    }
    frame
  }

  /// Estimator that remembers every symbol it was asked about. Costs
  /// depend on the history, so any divergence in coding order shows.
  #[derive(Clone, Debug, Default)]
  pub(crate) struct SymbolLog {
    log: Vec<Symbol>,
  }

  impl EntropyEstimator for SymbolLog {
    type State = Vec<Symbol>;

    fn checkpoint(&self) -> Vec<Symbol> {
      self.log.clone()
    }

    fn rollback(&mut self, state: &Vec<Symbol>) {
      self.log.clone_from(state);
    }

    fn estimate_bits(&mut self, symbol: Symbol) -> u32 {
      let base = match symbol {
        Symbol::CoeffLevel { level, .. } => 16 + 8 * level.min(31),
        Symbol::Mvd { value } => 8 + 4 * value.unsigned_abs().min(64) as u32,
        _ => 8,
      };
      self.log.push(symbol);
      base + (self.log.len() % 3) as u32
    }
  }

  #[test]
  fn ctu_commit_clears_in_progress_marks() {
    let enc = EncoderConfig { width: 64, height: 64, ..Default::default() };
    let fi = frame_invariants(&enc, SliceType::I);
    let src = random_picture(&enc, 1);
    let refs = [None, None];
    let rect = TileRect { x: 0, y: 0, width: 64, height: 64 };
    let mut ts = TileState::new(rect, &src, &refs, enc.chroma_sampling);
    let tools = Analyzers::default();
    let mut sc = SearchScratch::new(&fi);
    let mut est = AdaptiveBitEstimator::new();
    let mut dqp = DqpState::new(fi.dqp.tile_qp);

    let ctu =
      search_ctu(&fi, &tools, &mut ts, &mut sc, &mut est, 0, 0, &mut dqp);
    assert!(ts.maps.scu.iter().all(|&f| f & SCU_CODED != 0));
    assert!(ts.maps.scu.iter().all(|&f| f & SCU_IN_PROGRESS == 0));
    assert!(ctu.cost > 0.);
    let pixels: usize = ctu.stats.block_size_counts.values().sum();
    assert_eq!(pixels, 64 * 64);
    let leaves = ctu.leaves(64, 64);
    assert_eq!(leaves.iter().map(CodingNode::area).sum::<usize>(), 64 * 64);
    assert!(leaves
      .iter()
      .all(|n| ctu.pred_mode_at(n.x, n.y) == PredMode::MODE_INTRA));
  }

  #[test]
  fn tile_is_searched_in_raster_order() {
    let enc = EncoderConfig {
      width: 128,
      height: 96,
      ctu_log2: 5,
      ..Default::default()
    };
    let fi = frame_invariants(&enc, SliceType::I);
    let src = random_picture(&enc, 4);
    let refs = [None, None];
    let rect = TileRect { x: 0, y: 0, width: 128, height: 96 };
    let mut ts = TileState::new(rect, &src, &refs, enc.chroma_sampling);
    let tools = Analyzers::default();
    let mut est = AdaptiveBitEstimator::new();

    let ctus = encode_tile(&fi, &tools, &mut ts, &mut est);
    let pos: Vec<_> = ctus.iter().map(|c| (c.x, c.y)).collect();
    assert_eq!(pos.len(), 12);
    assert_eq!(&pos[..5], &[(0, 0), (32, 0), (64, 0), (96, 0), (0, 32)]);
    assert!(ts.maps.scu.iter().all(|&f| f & SCU_CODED != 0));
  }
}
