use crate::core::difficulty::{max_search_value, parse_hex, DifficultyTarget};
use crate::core::progress::{Progress, ProgressObserver, ThroughputMeter};
use crate::core::session::nonce_hex;
use crate::core::Block;
use crate::error::{MinerError, Result};
use crate::utils::{DigestBackend, DIGEST_LEN};
use log::{debug, warn};
use num_bigint::BigUint;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

/// A block whose id satisfies its target
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub block: Block,
    pub id: String,
    /// Nonce increments before the winning nonce; 0 when the origin already qualified
    pub attempts: u64,
    pub elapsed: Duration,
}

// What a single stride walker returns
enum WalkResult {
    Found {
        block: Block,
        digest: [u8; DIGEST_LEN],
        attempts: u64,
    },
    Exhausted {
        attempts: u64,
    },
    Cancelled {
        attempts: u64,
    },
}

pub struct ProofOfWork<'a, B: DigestBackend + ?Sized> {
    backend: &'a B,
    target: &'a DifficultyTarget,
    update_rate: u64,
}

impl<'a, B: DigestBackend + ?Sized> ProofOfWork<'a, B> {
    pub fn new(backend: &'a B, target: &'a DifficultyTarget, update_rate: u64) -> Self {
        ProofOfWork {
            backend,
            target,
            update_rate: update_rate.max(1),
        }
    }

    /// Recompute a block's id and check it against the block's own target
    pub fn validate(block: &Block, backend: &B) -> Result<bool> {
        block.meets_own_target(backend)
    }

    /// Search from the block's current nonce upwards, one nonce at a time
    pub fn run(
        &self,
        block: Block,
        height: u64,
        expected_tries: f64,
        observer: &mut dyn ProgressObserver,
    ) -> Result<SearchOutcome> {
        let started = Instant::now();
        let start = parse_hex(block.get_nonce())?;
        let never = AtomicBool::new(false);

        let walked = self.walk(
            block,
            start,
            1,
            &never,
            Some(Reporter {
                observer: &mut *observer,
                height,
                expected_tries,
                scale: 1,
            }),
        )?;

        match walked {
            WalkResult::Found {
                block,
                digest,
                attempts,
            } => {
                let outcome = SearchOutcome {
                    block,
                    id: Block::id_from_digest(&digest),
                    attempts,
                    elapsed: started.elapsed(),
                };
                observer.on_block_found(height, &outcome.id, attempts, outcome.elapsed);
                Ok(outcome)
            }
            WalkResult::Exhausted { attempts } | WalkResult::Cancelled { attempts } => {
                Err(MinerError::SearchExhausted {
                    height: height as usize,
                    attempts,
                })
            }
        }
    }

    /// Split the nonce space across `workers` threads by stride.
    ///
    /// Worker `k` tries `origin + k`, `origin + k + workers`, ... The first worker to
    /// find a valid nonce raises the shared flag and every sibling stops at its next
    /// attempt. Worker 0 runs on the calling thread and does the progress reporting.
    pub fn run_parallel(
        &self,
        block: Block,
        height: u64,
        expected_tries: f64,
        workers: usize,
        observer: &mut dyn ProgressObserver,
    ) -> Result<SearchOutcome> {
        if workers <= 1 {
            return self.run(block, height, expected_tries, observer);
        }

        let started = Instant::now();
        let origin = parse_hex(block.get_nonce())?;
        let stride = workers as u64;
        let found = AtomicBool::new(false);
        let winner: Mutex<Option<(Block, [u8; DIGEST_LEN])>> = Mutex::new(None);

        let results: Vec<Result<WalkResult>> = thread::scope(|scope| {
            let mut handles = Vec::with_capacity(workers - 1);
            for k in 1..workers {
                let block = block.clone();
                let start = &origin + BigUint::from(k as u64);
                let found = &found;
                let winner = &winner;
                handles.push(scope.spawn(move || {
                    let walked = self.walk(block, start, stride, found, None);
                    self.claim(walked, found, winner)
                }));
            }

            let local = self.walk(
                block.clone(),
                origin.clone(),
                stride,
                &found,
                Some(Reporter {
                    observer: &mut *observer,
                    height,
                    expected_tries,
                    scale: stride,
                }),
            );
            let mut results = vec![self.claim(local, &found, &winner)];
            for handle in handles {
                results.push(
                    handle
                        .join()
                        .unwrap_or_else(|payload| std::panic::resume_unwind(payload)),
                );
            }
            results
        });

        let mut attempts = 0u64;
        let mut first_error = None;
        for result in results {
            match result {
                Ok(WalkResult::Found { attempts: a, .. })
                | Ok(WalkResult::Exhausted { attempts: a })
                | Ok(WalkResult::Cancelled { attempts: a }) => attempts += a,
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        let claimed = winner
            .into_inner()
            .map_err(|_| MinerError::SearchExhausted {
                height: height as usize,
                attempts,
            })?;
        match claimed {
            Some((block, digest)) => {
                let outcome = SearchOutcome {
                    block,
                    id: Block::id_from_digest(&digest),
                    attempts,
                    elapsed: started.elapsed(),
                };
                observer.on_block_found(height, &outcome.id, attempts, outcome.elapsed);
                Ok(outcome)
            }
            None => Err(first_error.unwrap_or(MinerError::SearchExhausted {
                height: height as usize,
                attempts,
            })),
        }
    }

    // Record the first successful walk as the winner; later finds are ignored
    fn claim(
        &self,
        walked: Result<WalkResult>,
        found: &AtomicBool,
        winner: &Mutex<Option<(Block, [u8; DIGEST_LEN])>>,
    ) -> Result<WalkResult> {
        let walked = match walked {
            Ok(walked) => walked,
            Err(e) => {
                // An encoding failure is the same for every worker
                found.store(true, Ordering::SeqCst);
                return Err(e);
            }
        };
        if let WalkResult::Found {
            ref block,
            ref digest,
            ..
        } = walked
        {
            if let Ok(mut slot) = winner.lock() {
                if slot.is_none() {
                    *slot = Some((block.clone(), *digest));
                }
            }
        }
        Ok(walked)
    }

    // Walk `start, start + stride, ...` until a digest meets the target, the nonce
    // would pass 2^256 - 1, or `stop` is raised by a sibling
    fn walk(
        &self,
        mut block: Block,
        start: BigUint,
        stride: u64,
        stop: &AtomicBool,
        mut reporter: Option<Reporter<'_>>,
    ) -> Result<WalkResult> {
        let max = max_search_value();
        let step = BigUint::from(stride);
        let mut nonce = start;
        let mut attempts = 0u64;
        let mut meter = ThroughputMeter::new(self.update_rate);

        if nonce > max {
            return Ok(WalkResult::Exhausted { attempts });
        }
        block.set_nonce(nonce_hex(&nonce));

        loop {
            if stop.load(Ordering::Relaxed) {
                return Ok(WalkResult::Cancelled { attempts });
            }

            let digest = block.digest(self.backend)?;
            if self.target.is_met_by(&digest) {
                stop.store(true, Ordering::SeqCst);
                return Ok(WalkResult::Found {
                    block,
                    digest,
                    attempts,
                });
            }

            nonce += &step;
            if nonce > max {
                warn!("Nonce passed the top of the search space after {attempts} attempts");
                return Ok(WalkResult::Exhausted { attempts });
            }
            block.set_nonce(nonce_hex(&nonce));
            attempts += 1;

            if let Some(rate) = meter.tick(attempts) {
                if let Some(reporter) = reporter.as_mut() {
                    reporter.report(attempts, rate);
                } else {
                    debug!("Worker checkpoint: {attempts} attempts at {rate:.0} H/s");
                }
            }
        }
    }
}

// Progress plumbing for the worker that owns the observer
struct Reporter<'o> {
    observer: &'o mut dyn ProgressObserver,
    height: u64,
    expected_tries: f64,
    // Number of workers sharing the space; their combined rate is roughly `scale` times ours
    scale: u64,
}

impl Reporter<'_> {
    fn report(&mut self, attempts: u64, rate: f64) {
        let scale = self.scale as f64;
        let progress = Progress::new(
            self.height,
            attempts * self.scale,
            self.expected_tries,
            rate * scale,
        );
        self.observer.on_checkpoint(&progress);
    }
}
