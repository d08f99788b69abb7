// Copyright (c) 2017-2022, The evce contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

//! evce is the mode-decision core of a block-based video encoder.
//!
//! For every coding tree unit (CTU) of a picture it recursively decides
//! whether to split a block into four, which prediction mode to use for
//! each leaf and which QP to quantize it with, choosing the combination
//! with the lowest rate-distortion cost. Prediction, deblocking and
//! entropy cost estimation are injected collaborators; reference
//! implementations of each are provided.
//!
//! # Example
//!
//! ```
//! use evce::prelude::*;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let enc = EncoderConfig { width: 64, height: 64, ..Default::default() };
//! let ctx: Context<u8> = Context::new(enc)?;
//!
//! let frame = Arc::new(ctx.new_frame());
//! let picture = PictureInput::intra(frame);
//! let decision = ctx.search_picture(&picture)?;
//! assert_eq!(decision.ctus.len(), 1);
//! # Ok(())
//! # }
//! ```

#![deny(bare_trait_objects)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::cast_ptr_alignment)]
#![allow(clippy::cognitive_complexity)]
#![allow(clippy::needless_range_loop)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::verbose_bit_mask)]
#![allow(clippy::unreadable_literal)]
#![allow(clippy::many_single_char_names)]
#![warn(clippy::expl_impl_clone_on_copy)]
#![warn(clippy::linkedlist)]
#![warn(clippy::map_flatten)]
#![warn(clippy::mem_forget)]
#![warn(clippy::mut_mut)]
#![warn(clippy::mutex_integer)]
#![warn(clippy::needless_borrow)]
#![warn(clippy::needless_continue)]
#![warn(clippy::path_buf_push_overwrite)]
#![warn(clippy::range_plus_one)]

mod serialize {
  cfg_if::cfg_if! {
    if #[cfg(feature="serialize")] {
      pub use serde::*;
    } else {
      pub use noop_proc_macro::{Deserialize, Serialize};
    }
  }
}

mod util;

mod api;
mod context;
mod deblock;
mod dist;
mod encoder;
mod frame;
mod partition;
mod predict;
mod quantize;
mod rdo;
mod stats;
mod tiling;

pub use crate::api::*;

/// Commonly used types and traits.
pub mod prelude {
  pub use crate::api::*;
  pub use crate::context::{
    AdaptiveBitEstimator, DqpState, EntropyEstimator, Symbol, OD_BITRES,
  };
  pub use crate::deblock::{
    DeblockFilter, DeblockWork, FilterDirection, SimpleDeblockFilter,
  };
  pub use crate::encoder::cu_data::CuData;
  pub use crate::encoder::{CtuDecision, FrameInvariants};
  pub use crate::frame::*;
  pub use crate::partition::*;
  pub use crate::predict::{
    AnalysisRequest, Analyzers, BasicInterAnalyzer, BasicIntraAnalyzer,
    InterAnalyzer, IntraAnalyzer, PredictionCandidate,
  };
  pub use crate::quantize::{QpOffsetMap, QpRange, MAX_QP, MIN_QP};
  pub use crate::stats::SearchStats;
  pub use v_frame::pixel::{CastFromPrimitive, ChromaSampling, Pixel};
  pub use v_frame::plane::Plane;
}

/// Raw building blocks of the search, for benchmarking and tooling.
pub mod internals {
  pub use crate::context::neighbor;
  pub use crate::context::SearchCheckpoint;
  pub use crate::deblock::delta_distortion;
  pub use crate::dist::{get_sad, get_satd, get_ssd};
  pub use crate::encoder::cu_data::CuDataPool;
  pub use crate::encoder::partition::{
    search_partition, NodeDecision, NodePermissions,
  };
  pub use crate::encoder::{encode_tile, search_ctu, SearchScratch};
  pub use crate::quantize::{select_qp_range, DqpParams, QpTables};
  pub use crate::rdo::{
    compute_rd_cost, rdo_mode_decision, ModeDecision, RdoScratch,
  };
  pub use crate::tiling::{TileFrame, TileRect, TileState, TilingInfo};
}
