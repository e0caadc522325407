use rand::Rng;

/// Seconds to wait before the next attempt, given the number of retries
/// already recorded. Formula from Sidekiq (originally from delayed_job):
/// count^4 + 15 + rand(30) * (count + 1).
pub(crate) fn retry_delay(count: u32) -> u64 {
    retry_delay_with(&mut rand::thread_rng(), count)
}

fn retry_delay_with<R: Rng>(rng: &mut R, count: u32) -> u64 {
    let count = count as u64;
    count.pow(4) + 15 + rng.gen_range(0..30) * (count + 1)
}
