// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Shared test fixtures.

use hifitime::{Duration, Epoch};
use rand::{rngs::StdRng, Rng, SeedableRng};
use vec1::Vec1;

use crate::{
    noise::DiagonalNoise,
    obs::{Dataset, Observation},
};

pub(crate) const TEST_DETS: [&str; 4] = ["det00", "det01", "det02", "det03"];

/// Route operator logging through the test harness; safe to call from
/// every test.
pub(crate) fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A satellite-style fake observation: 4 detectors, a regular 10 Hz
/// timebase and a zero-filled "signal" buffer.
pub(crate) fn fake_observation(n_samples: usize) -> Observation {
    let start = Epoch::from_gpst_seconds(1_090_008_640.0);
    let dt = Duration::from_seconds(0.1);
    let times = Vec1::try_from_vec(
        (0..n_samples)
            .map(|i| {
                start + Duration::from_total_nanoseconds(i as i128 * dt.total_nanoseconds())
            })
            .collect::<Vec<_>>(),
    )
    .unwrap();
    let detectors =
        Vec1::try_from_vec(TEST_DETS.iter().map(|d| d.to_string()).collect::<Vec<_>>()).unwrap();
    let mut obs = Observation::new("fake_obs", detectors, times);
    obs.ensure_detdata("signal");
    obs
}

pub(crate) fn fake_dataset(n_samples: usize) -> Dataset {
    Dataset::new(vec![fake_observation(n_samples)])
}

/// The uniform uncorrelated noise model used by most tests.
pub(crate) fn fake_noise() -> DiagonalNoise {
    DiagonalNoise::uniform(TEST_DETS, 2.5)
}

/// Fill a named timestream with reproducible uniform noise.
pub(crate) fn fill_random(data: &mut Dataset, key: &str, seed: u64) {
    let mut rng = StdRng::seed_from_u64(seed);
    for obs in &mut data.obs {
        obs.ensure_detdata(key);
        let arr = obs.detdata_mut(key).unwrap();
        arr.mapv_inplace(|_| rng.gen_range(-1000.0..1000.0));
    }
}
