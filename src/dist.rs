// Copyright (c) 2019-2022, The evce contributors. All rights reserved
//
// This source code is subject to the terms of the BSD 2 Clause License and
// the Alliance for Open Media Patent License 1.0. If the BSD 2 Clause License
// was not distributed with this source code in the LICENSE file, you can
// obtain it at www.aomedia.org/license/software. If the Alliance for Open
// Media Patent License 1.0 was not distributed with this source code in the
// PATENTS file, you can obtain it at www.aomedia.org/license/patent.

use crate::util::*;
use itertools::izip;

#[inline(always)]
fn rows<'a, T: Pixel>(
  src: &'a [T], stride: usize, w: usize, h: usize,
) -> impl Iterator<Item = &'a [T]> {
  src.chunks(stride).take(h).map(move |r| &r[..w])
}

/// Sum of absolute differences.
#[inline]
pub fn get_sad<T: Pixel>(
  org: &[T], org_stride: usize, rec: &[T], rec_stride: usize, w: usize,
  h: usize,
) -> u32 {
  let mut sum = 0u32;

  for (row_org, row_rec) in
    rows(org, org_stride, w, h).zip(rows(rec, rec_stride, w, h))
  {
    sum += row_org
      .iter()
      .zip(row_rec)
      .map(|(&a, &b)| (i32::cast_from(a) - i32::cast_from(b)).unsigned_abs())
      .sum::<u32>();
  }

  sum
}

/// Sum of squared differences.
#[inline]
pub fn get_ssd<T: Pixel>(
  org: &[T], org_stride: usize, rec: &[T], rec_stride: usize, w: usize,
  h: usize,
) -> u64 {
  let mut sum = 0u64;

  for (row_org, row_rec) in
    rows(org, org_stride, w, h).zip(rows(rec, rec_stride, w, h))
  {
    sum += row_org
      .iter()
      .zip(row_rec)
      .map(|(&a, &b)| {
        let d = i32::cast_from(a) - i32::cast_from(b);
        (d * d) as u64
      })
      .sum::<u64>();
  }

  sum
}

#[inline(always)]
fn butterfly(a: i32, b: i32) -> (i32, i32) {
  ((a + b), (a - b))
}

#[inline(always)]
#[allow(clippy::identity_op, clippy::erasing_op)]
fn hadamard4_1d(data: &mut [i32], n: usize, stride0: usize, stride1: usize) {
  for i in 0..n {
    let sub: &mut [i32] = &mut data[i * stride0..];
    let (a0, a1) = butterfly(sub[0 * stride1], sub[1 * stride1]);
    let (a2, a3) = butterfly(sub[2 * stride1], sub[3 * stride1]);
    let (b0, b2) = butterfly(a0, a2);
    let (b1, b3) = butterfly(a1, a3);
    sub[0 * stride1] = b0;
    sub[1 * stride1] = b1;
    sub[2 * stride1] = b2;
    sub[3 * stride1] = b3;
  }
}

#[inline(always)]
#[allow(clippy::identity_op, clippy::erasing_op)]
fn hadamard8_1d(data: &mut [i32], n: usize, stride0: usize, stride1: usize) {
  for i in 0..n {
    let sub: &mut [i32] = &mut data[i * stride0..];

    let (a0, a1) = butterfly(sub[0 * stride1], sub[1 * stride1]);
    let (a2, a3) = butterfly(sub[2 * stride1], sub[3 * stride1]);
    let (a4, a5) = butterfly(sub[4 * stride1], sub[5 * stride1]);
    let (a6, a7) = butterfly(sub[6 * stride1], sub[7 * stride1]);

    let (b0, b2) = butterfly(a0, a2);
    let (b1, b3) = butterfly(a1, a3);
    let (b4, b6) = butterfly(a4, a6);
    let (b5, b7) = butterfly(a5, a7);

    let (c0, c4) = butterfly(b0, b4);
    let (c1, c5) = butterfly(b1, b5);
    let (c2, c6) = butterfly(b2, b6);
    let (c3, c7) = butterfly(b3, b7);

    sub[0 * stride1] = c0;
    sub[1 * stride1] = c1;
    sub[2 * stride1] = c2;
    sub[3 * stride1] = c3;
    sub[4 * stride1] = c4;
    sub[5 * stride1] = c5;
    sub[6 * stride1] = c6;
    sub[7 * stride1] = c7;
  }
}

#[inline(always)]
fn hadamard2d(data: &mut [i32], (w, h): (usize, usize)) {
  /*Vertical transform.*/
  let vert_func = if h == 4 { hadamard4_1d } else { hadamard8_1d };
  vert_func(data, w, 1, h);
  /*Horizontal transform.*/
  let horz_func = if w == 4 { hadamard4_1d } else { hadamard8_1d };
  horz_func(data, h, w, 1);
}

/// Sum of absolute transformed differences.
///
/// Uses 4x4 Hadamard transforms for blocks with a side of 4 and 8x8 ones
/// otherwise. Both sides must be multiples of 4.
pub fn get_satd<T: Pixel>(
  org: &[T], org_stride: usize, rec: &[T], rec_stride: usize, w: usize,
  h: usize,
) -> u32 {
  let size: usize = w.min(h).min(8);
  let mut sum = 0u64;
  let mut buf = [0i32; 8 * 8];

  for chunk_y in (0..h).step_by(size) {
    for chunk_x in (0..w).step_by(size) {
      let buf = &mut buf[..size * size];
      let chunk_org = &org[chunk_y * org_stride + chunk_x..];
      let chunk_rec = &rec[chunk_y * rec_stride + chunk_x..];

      for (row_diff, row_org, row_rec) in izip!(
        buf.chunks_mut(size),
        rows(chunk_org, org_stride, size, size),
        rows(chunk_rec, rec_stride, size, size)
      ) {
        for (diff, &a, &b) in izip!(row_diff.iter_mut(), row_org, row_rec) {
          *diff = i32::cast_from(a) - i32::cast_from(b);
        }
      }

      hadamard2d(buf, (size, size));

      sum += buf.iter().map(|a| a.unsigned_abs() as u64).sum::<u64>();
    }
  }

  // Normalize the results
  let ln = msb(size as i32) as u64;
  ((sum + (1 << ln >> 1)) >> ln) as u32
}

#[cfg(test)]
pub mod test {
  use super::*;
  use v_frame::plane::Plane;

  // Two planes with different strides and a constant difference of `d`.
  fn setup_planes<T: Pixel>(d: i32) -> (Plane<T>, Plane<T>) {
    let mut input_plane = Plane::new(640, 480, 0, 0, 0, 0);
    let mut rec_plane = Plane::new(704, 480, 0, 0, 0, 0);

    for (i, row) in
      input_plane.data.chunks_mut(input_plane.cfg.stride).enumerate()
    {
      for (j, pixel) in row.iter_mut().enumerate() {
        *pixel = T::cast_from(((i * 3 + j * 5) & 127) as i32 + d);
      }
    }
    for (i, row) in rec_plane.data.chunks_mut(rec_plane.cfg.stride).enumerate()
    {
      for (j, pixel) in row.iter_mut().enumerate() {
        *pixel = T::cast_from(((i * 3 + j * 5) & 127) as i32);
      }
    }

    (input_plane, rec_plane)
  }

  const BLOCKS: [(usize, usize); 8] =
    [(4, 4), (4, 8), (8, 4), (8, 8), (16, 8), (16, 16), (32, 64), (64, 64)];

  fn region<T: Pixel>(p: &Plane<T>) -> (&[T], usize) {
    let stride = p.cfg.stride;
    (&p.data_origin()[40 * stride + 32..], stride)
  }

  fn get_sad_same_inner<T: Pixel>() {
    let (input_plane, rec_plane) = setup_planes::<T>(3);
    let (org, org_stride) = region(&input_plane);
    let (rec, rec_stride) = region(&rec_plane);

    for (w, h) in BLOCKS {
      assert_eq!(
        (3 * w * h) as u32,
        get_sad(org, org_stride, rec, rec_stride, w, h)
      );
      assert_eq!(0, get_sad(rec, rec_stride, rec, rec_stride, w, h));
    }
  }

  #[test]
  fn get_sad_same_u8() {
    get_sad_same_inner::<u8>();
  }

  #[test]
  fn get_sad_same_u16() {
    get_sad_same_inner::<u16>();
  }

  fn get_ssd_same_inner<T: Pixel>() {
    let (input_plane, rec_plane) = setup_planes::<T>(5);
    let (org, org_stride) = region(&input_plane);
    let (rec, rec_stride) = region(&rec_plane);

    for (w, h) in BLOCKS {
      assert_eq!(
        (25 * w * h) as u64,
        get_ssd(org, org_stride, rec, rec_stride, w, h)
      );
    }
  }

  #[test]
  fn get_ssd_same_u8() {
    get_ssd_same_inner::<u8>();
  }

  #[test]
  fn get_ssd_same_u16() {
    get_ssd_same_inner::<u16>();
  }

  // A constant difference only excites the DC coefficient of each
  // transform, which normalizes back to `size * d`.
  fn get_satd_same_inner<T: Pixel>() {
    let (input_plane, rec_plane) = setup_planes::<T>(2);
    let (org, org_stride) = region(&input_plane);
    let (rec, rec_stride) = region(&rec_plane);

    for (w, h) in BLOCKS {
      let size = w.min(h).min(8);
      let chunks = (w / size) * (h / size);
      assert_eq!(
        (chunks * size * 2) as u32,
        get_satd(org, org_stride, rec, rec_stride, w, h)
      );
      assert_eq!(0, get_satd(org, org_stride, org, org_stride, w, h));
    }
  }

  #[test]
  fn get_satd_same_u8() {
    get_satd_same_inner::<u8>();
  }

  #[test]
  fn get_satd_same_u16() {
    get_satd_same_inner::<u16>();
  }
}
