// Copyright (c) 2018-2022, The evce contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use crate::encoder::test::random_picture;
use crate::prelude::*;

use std::sync::Arc;

use interpolate_name::interpolate_test;
use pretty_assertions::assert_eq;

fn setup_config(
  w: usize, h: usize, speed: usize, chroma_sampling: ChromaSampling,
) -> EncoderConfig {
  let mut enc = EncoderConfig::with_speed_preset(speed);
  enc.width = w;
  enc.height = h;
  enc.chroma_sampling = chroma_sampling;
  enc
}

fn setup_context(enc: &EncoderConfig) -> Context<u8> {
  Context::new(enc.clone()).unwrap()
}

fn flat_frame<T: Pixel>(ctx: &Context<T>, value: T) -> Arc<Frame<T>> {
  let mut frame = ctx.new_frame();
  frame.fill(value);
  Arc::new(frame)
}

/// Every SCU of the picture is covered by exactly one committed leaf.
fn assert_leaves_tile_picture<T: Pixel>(
  decision: &PictureDecision<T>, enc: &EncoderConfig,
) {
  let w_scu = enc.width >> MIN_CU_LOG2;
  let h_scu = enc.height >> MIN_CU_LOG2;
  let mut cover = vec![0u8; w_scu * h_scu];
  for ctu in decision.ctus.iter() {
    for leaf in ctu.leaves(enc.width, enc.height) {
      let (w, h) = leaf.clipped_size(enc.width, enc.height);
      for y in (leaf.y >> MIN_CU_LOG2)..((leaf.y + h) >> MIN_CU_LOG2) {
        for x in (leaf.x >> MIN_CU_LOG2)..((leaf.x + w) >> MIN_CU_LOG2) {
          cover[y * w_scu + x] += 1;
        }
      }
    }
  }
  assert!(cover.iter().all(|&c| c == 1));
}

#[test]
fn flat_inter_picture_is_skipped_whole() {
  let mut enc = setup_config(64, 64, 0, ChromaSampling::Cs420);
  enc.speed_settings = SpeedSettings::exhaustive();
  let ctx = setup_context(&enc);
  let input = flat_frame(&ctx, 128);
  let refp = flat_frame(&ctx, 128);

  let picture = PictureInput::predicted(input.clone(), refp);
  let decision = ctx.search_picture(&picture).unwrap();

  assert_eq!(decision.ctus.len(), 1);
  let ctu = &decision.ctus[0];
  assert_eq!(ctu.split, SplitMode::NO_SPLIT);
  assert_eq!(ctu.pred_mode_at(0, 0), PredMode::MODE_SKIP);
  assert_eq!(decision.stats.skip_block_count, 64 * 64);
  assert_eq!(decision.rec, *input);
}

#[test]
fn straddling_ctu_is_split_without_a_root_leaf() {
  let enc = setup_config(120, 64, 0, ChromaSampling::Cs420);
  let ctx = setup_context(&enc);
  let input = Arc::new(random_picture(&enc, 11));
  let decision = ctx.search_picture(&PictureInput::intra(input)).unwrap();

  assert_eq!(decision.ctus.len(), 2);
  let edge = &decision.ctus[1];
  assert_eq!((edge.x, edge.y), (64, 0));
  assert_eq!(edge.split, SplitMode::SPLIT_QUAD);
  assert_eq!(edge.stats.leaf_evaluations[6 - MIN_CU_LOG2], 0);
  let area: usize = edge
    .leaves(120, 64)
    .iter()
    .map(|n| {
      let (w, h) = n.clipped_size(120, 64);
      w * h
    })
    .sum();
  assert_eq!(area, 56 * 64);
  assert!(decision.maps.scu.iter().all(|&f| f & SCU_CODED != 0));
  assert_leaves_tile_picture(&decision, &enc);
}

#[test]
fn search_is_deterministic() {
  let mut enc = setup_config(128, 128, 6, ChromaSampling::Cs420);
  enc.tile_cols = 2;
  enc.cu_qp_delta = true;
  let ctx = setup_context(&enc);
  let input = Arc::new(random_picture(&enc, 21));
  let refp = Arc::new(random_picture(&enc, 22));
  let picture = PictureInput::predicted(input, refp);

  let a = ctx.search_picture(&picture).unwrap();
  let b = ctx.search_picture(&picture).unwrap();
  assert_eq!(a.cost(), b.cost());
  assert_eq!(a.stats, b.stats);
  assert_eq!(a.maps, b.maps);
  assert!(a.rec == b.rec);
  let splits = |d: &PictureDecision<u8>| {
    d.ctus.iter().map(|c| (c.x, c.y, c.split)).collect::<Vec<_>>()
  };
  assert_eq!(splits(&a), splits(&b));
}

#[test]
fn tiles_are_stitched_in_tile_order() {
  let mut enc = setup_config(128, 128, 6, ChromaSampling::Cs420);
  enc.ctu_log2 = 5;
  enc.tile_cols = 2;
  enc.tile_rows = 2;
  let ctx = setup_context(&enc);
  let input = Arc::new(random_picture(&enc, 31));
  let decision = ctx.search_picture(&PictureInput::intra(input)).unwrap();

  assert_eq!(decision.ctus.len(), 16);
  let first: Vec<_> =
    decision.ctus.iter().take(5).map(|c| (c.x, c.y)).collect();
  assert_eq!(first, vec![(0, 0), (32, 0), (0, 32), (32, 32), (64, 0)]);
  assert!(decision.maps.scu.iter().all(|&f| f & SCU_CODED != 0));
  assert!(decision.maps.scu.iter().all(|&f| f & SCU_IN_PROGRESS == 0));
  assert_leaves_tile_picture(&decision, &enc);

  let pixels: usize = decision.stats.block_size_counts.values().sum();
  assert_eq!(pixels, 128 * 128);
}

#[interpolate_test(cs420_speed0, ChromaSampling::Cs420, 0)]
#[interpolate_test(cs420_speed10, ChromaSampling::Cs420, 10)]
#[interpolate_test(cs422_speed6, ChromaSampling::Cs422, 6)]
#[interpolate_test(cs444_speed6, ChromaSampling::Cs444, 6)]
fn leaves_cover_the_picture(cs: ChromaSampling, speed: usize) {
  let enc = setup_config(96, 72, speed, cs);
  let ctx = setup_context(&enc);
  let input = Arc::new(random_picture(&enc, 41));
  let refp = Arc::new(random_picture(&enc, 42));

  for picture in
    [PictureInput::intra(input.clone()), PictureInput::predicted(input, refp)]
  {
    let decision = ctx.search_picture(&picture).unwrap();
    assert_eq!(decision.ctus.len(), 4);
    assert_leaves_tile_picture(&decision, &enc);
    assert!(decision.cost() > 0.);
    if picture.slice_type.is_intra() {
      assert!(decision
        .maps
        .scu
        .iter()
        .all(|&f| f & (SCU_CODED | SCU_INTRA) == SCU_CODED | SCU_INTRA));
    }
  }
}

#[test]
fn invalid_configs_are_rejected() {
  let valid = setup_config(64, 64, 6, ChromaSampling::Cs420);
  assert_eq!(valid.validate(), Ok(()));

  let check = |f: &dyn Fn(&mut EncoderConfig), err: InvalidConfig| {
    let mut enc = valid.clone();
    f(&mut enc);
    assert_eq!(enc.validate(), Err(err));
    assert!(Context::<u16>::new(enc).is_err());
  };
  check(&|e| e.width = 100, InvalidConfig::InvalidWidth(100));
  check(&|e| e.height = 0, InvalidConfig::InvalidHeight(0));
  check(&|e| e.bit_depth = 12, InvalidConfig::InvalidBitDepth(12));
  check(
    &|e| e.chroma_sampling = ChromaSampling::Cs400,
    InvalidConfig::UnsupportedChromaSampling(ChromaSampling::Cs400),
  );
  check(
    &|e| e.ctu_log2 = 8,
    InvalidConfig::InvalidCtuSize { actual: 8, min: 4, max: 7 },
  );
  check(
    &|e| e.base_qp = 52,
    InvalidConfig::InvalidQp { actual: 52, max: 51 },
  );
  check(
    &|e| e.chroma_qp_offset = [0, -13],
    InvalidConfig::InvalidChromaQpOffset(-13),
  );
  check(
    &|e| {
      e.cu_qp_delta = true;
      e.cu_qp_delta_area = 9;
    },
    InvalidConfig::InvalidQpDeltaArea(9),
  );
  check(
    &|e| {
      e.ctu_log2 = 4;
      e.speed_settings.partition_range = PartitionRange::new(5, 7);
    },
    InvalidConfig::InvalidPartitionRange { min: 5, max: 7 },
  );
  check(&|e| e.tile_cols = 0, InvalidConfig::InvalidTileCols(0));
  check(&|e| e.tile_rows = 23, InvalidConfig::InvalidTileRows(23));
}

#[test]
fn mismatched_pictures_are_rejected() {
  let enc = setup_config(64, 64, 6, ChromaSampling::Cs420);
  let ctx = setup_context(&enc);
  let input = flat_frame(&ctx, 100);

  let small = Arc::new(Frame::new(64, 32, ChromaSampling::Cs420));
  assert_eq!(
    ctx.search_picture(&PictureInput::intra(small)).unwrap_err(),
    SearchError::DimensionMismatch {
      width: 64,
      height: 32,
      expected_width: 64,
      expected_height: 64,
    }
  );

  let cs444 = Arc::new(Frame::new(64, 64, ChromaSampling::Cs444));
  assert_eq!(
    ctx.search_picture(&PictureInput::intra(cs444)).unwrap_err(),
    SearchError::ChromaSamplingMismatch(ChromaSampling::Cs420)
  );

  let mut p = PictureInput::intra(input.clone());
  p.slice_type = SliceType::B;
  assert_eq!(
    ctx.search_picture(&p).unwrap_err(),
    SearchError::MissingReference(SliceType::B)
  );

  let mut p = PictureInput::intra(input.clone());
  p.qp = Some(60);
  assert_eq!(
    ctx.search_picture(&p).unwrap_err(),
    SearchError::InvalidQp(60)
  );

  let mut p = PictureInput::intra(input);
  p.qp_offsets = Some(Arc::new(QpOffsetMap::new(32, 32)));
  assert_eq!(
    ctx.search_picture(&p).unwrap_err(),
    SearchError::QpOffsetMismatch { width: 32, height: 32 }
  );
}

#[test]
fn adaptive_qp_follows_the_offset_map() {
  let mut enc = setup_config(64, 64, 6, ChromaSampling::Cs420);
  enc.cu_qp_delta = true;
  enc.cu_qp_delta_area = 12;
  enc.adaptive_qp = true;
  enc.base_qp = 30;
  let ctx = setup_context(&enc);
  let input = Arc::new(random_picture(&enc, 51));

  let mut offsets = QpOffsetMap::new(64, 64);
  offsets.offsets.fill(-4.);
  let mut picture = PictureInput::intra(input);
  picture.qp_offsets = Some(Arc::new(offsets));
  let decision = ctx.search_picture(&picture).unwrap();

  // Every 64x64 group has coefficients on a noisy picture, so each signals
  // the offset QP.
  assert!(decision.maps.qp.iter().all(|&qp| qp == 26));
}

#[test]
fn sixteen_bit_pixels_search_10_bit_pictures() {
  let mut enc = setup_config(64, 64, 6, ChromaSampling::Cs420);
  enc.bit_depth = 10;
  let ctx: Context<u16> = Context::new(enc).unwrap();
  let mut frame = ctx.new_frame();
  for (i, px) in frame.planes[0].data.iter_mut().enumerate() {
    *px = ((i * 7) % 1024) as u16;
  }
  let decision =
    ctx.search_picture(&PictureInput::intra(Arc::new(frame))).unwrap();
  assert!(decision.maps.scu.iter().all(|&f| f & SCU_CODED != 0));
  assert!(decision.rec.planes[0].data.iter().all(|&px| px < 1024));
}
