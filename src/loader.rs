//! "Load more" pagination loader.
//!
//! Drives a page's "load more" control until the page reports that no more
//! rows exist, or until `max_tries` consecutive activations add nothing.
//!
//! ```text
//! attempts = 0
//! while attempts < max_tries:
//!     control = find_control(id)     // absent   -> ControlAbsent
//!     if control.is_disabled(): stop // disabled -> ControlDisabled
//!     before = count_rows(selector)
//!     activate(control)
//!     after = wait_for_rows(selector, before, settle)
//!     attempts = if after == before { attempts + 1 } else { 0 }
//! -> StallLimitReached
//! ```
//!
//! The loader knows nothing about how the page is implemented. A browser
//! driver, an HTTP client with a "next page" endpoint, or a test double can
//! all sit behind [`PageHandle`].

use crate::error::{CitationsError, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Element id of the "Show more" button on a Scholar profile.
pub const DEFAULT_CONTROL_ID: &str = "gsc_bpf_more";

/// CSS selector of one publication row on a Scholar profile.
pub const DEFAULT_ROW_SELECTOR: &str = ".gsc_a_tr";

/// Default number of consecutive stalled activations before giving up.
pub const DEFAULT_MAX_TRIES: u32 = 10;

/// Default pause after each activation.
pub const DEFAULT_SETTLE: Duration = Duration::from_secs(2);

/// Default number of consecutive transient faults tolerated.
pub const DEFAULT_MAX_FAULT_RETRIES: u32 = 3;

/// Snapshot of a "load more" control as found on the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadMoreControl {
    id: String,
    disabled: bool,
}

impl LoadMoreControl {
    pub fn new(id: impl Into<String>, disabled: bool) -> Self {
        Self {
            id: id.into(),
            disabled,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether the page marks the control as unusable (end of data).
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }
}

/// A page that exposes result rows and, possibly, a "load more" control.
#[async_trait]
pub trait PageHandle: Send {
    /// Locate the control by id. `Ok(None)` means the page has no such control.
    async fn find_control(&mut self, id: &str) -> Result<Option<LoadMoreControl>>;

    /// Trigger the control (simulated user action).
    async fn activate(&mut self, control: &LoadMoreControl) -> Result<()>;

    /// Number of rows currently matching `selector`.
    async fn count_rows(&mut self, selector: &str) -> Result<usize>;

    /// Wait until the page has settled after an activation and return the
    /// row count.
    ///
    /// The default is a blind fixed sleep followed by a count. Pages that
    /// know when new content is ready should override this.
    async fn wait_for_rows(
        &mut self,
        selector: &str,
        _before: usize,
        settle: Duration,
    ) -> Result<usize> {
        tokio::time::sleep(settle).await;
        self.count_rows(selector).await
    }
}

/// Loader settings.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Id of the "load more" control
    pub control_id: String,
    /// Selector for the rows being counted
    pub row_selector: String,
    /// Consecutive stalled activations before giving up (always > 0)
    max_tries: u32,
    /// Pause between fault retries, and after each activation for pages
    /// that keep the default `wait_for_rows`
    pub settle: Duration,
    /// Consecutive transient faults retried before giving up
    pub max_fault_retries: u32,
}

impl LoaderConfig {
    /// Create a config with the given stall threshold.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `max_tries` is zero.
    pub fn new(max_tries: u32) -> Result<Self> {
        if max_tries == 0 {
            return Err(CitationsError::Validation(
                "max_tries must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            max_tries,
            ..Self::default()
        })
    }

    pub fn max_tries(&self) -> u32 {
        self.max_tries
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn with_max_fault_retries(mut self, retries: u32) -> Self {
        self.max_fault_retries = retries;
        self
    }

    pub fn with_control_id(mut self, id: impl Into<String>) -> Self {
        self.control_id = id.into();
        self
    }

    pub fn with_row_selector(mut self, selector: impl Into<String>) -> Self {
        self.row_selector = selector.into();
        self
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            control_id: DEFAULT_CONTROL_ID.to_string(),
            row_selector: DEFAULT_ROW_SELECTOR.to_string(),
            max_tries: DEFAULT_MAX_TRIES,
            settle: DEFAULT_SETTLE,
            max_fault_retries: DEFAULT_MAX_FAULT_RETRIES,
        }
    }
}

/// Why the loader stopped.
#[derive(Debug)]
pub enum Termination {
    /// The control could not be located: no more pages exist
    ControlAbsent,
    /// The control reported itself disabled: explicit end of data
    ControlDisabled,
    /// `max_tries` consecutive activations added no rows
    StallLimitReached,
    /// A non-transient fault, or too many transient ones in a row
    Faulted(CitationsError),
}

/// Result of a [`load_all`] run.
#[derive(Debug)]
pub struct LoadOutcome {
    pub termination: Termination,
    /// Number of times the control was activated
    pub activations: usize,
    /// Last observed row count (0 if none was observed)
    pub rows: usize,
}

impl LoadOutcome {
    /// Whether loading ended on an expected signal rather than a fault.
    pub fn is_complete(&self) -> bool {
        !matches!(self.termination, Termination::Faulted(_))
    }

    /// Turn a faulted outcome into an error.
    pub fn into_result(self) -> Result<Self> {
        match self.termination {
            Termination::Faulted(err) => Err(err),
            _ => Ok(self),
        }
    }
}

/// One pass through steps a-f.
enum Step {
    Absent,
    Disabled,
    Activated { before: usize, after: usize },
}

/// `activations` is bumped as soon as the control is triggered, so a click
/// followed by a failed observation is still counted.
async fn step<P: PageHandle + ?Sized>(
    page: &mut P,
    config: &LoaderConfig,
    activations: &mut usize,
) -> Result<Step> {
    let control = match page.find_control(&config.control_id).await? {
        Some(control) => control,
        None => return Ok(Step::Absent),
    };
    if control.is_disabled() {
        return Ok(Step::Disabled);
    }

    let before = page.count_rows(&config.row_selector).await?;
    page.activate(&control).await?;
    *activations += 1;
    let after = page
        .wait_for_rows(&config.row_selector, before, config.settle)
        .await?;

    Ok(Step::Activated { before, after })
}

/// Activate the page's "load more" control until loading is complete.
///
/// Stops when the control is absent, when it is disabled, or after
/// `max_tries` consecutive activations that add no rows. Any progress resets
/// the stall counter to zero. Transient faults are retried after a settle
/// pause, up to `max_fault_retries` in a row; other faults stop the loop.
pub async fn load_all<P: PageHandle + ?Sized>(page: &mut P, config: &LoaderConfig) -> LoadOutcome {
    let mut attempts: u32 = 0;
    let mut faults: u32 = 0;
    let mut activations: usize = 0;
    let mut rows: usize = 0;

    let termination = loop {
        if attempts >= config.max_tries {
            break Termination::StallLimitReached;
        }

        match step(page, config, &mut activations).await {
            Ok(Step::Absent) => break Termination::ControlAbsent,
            Ok(Step::Disabled) => break Termination::ControlDisabled,
            Ok(Step::Activated { before, after }) => {
                faults = 0;
                rows = after;

                if after == before {
                    attempts += 1;
                } else {
                    attempts = 0;
                }
                debug!(activations, before, after, attempts, "Activated load-more control");
            }
            Err(err) if err.is_transient() && faults < config.max_fault_retries => {
                faults += 1;
                warn!(
                    error = %err,
                    fault = faults,
                    max = config.max_fault_retries,
                    "Transient fault while loading, retrying"
                );
                tokio::time::sleep(config.settle).await;
            }
            Err(err) => break Termination::Faulted(err),
        }
    };

    info!(
        termination = ?termination,
        activations,
        rows,
        "Pagination loading finished"
    );

    LoadOutcome {
        termination,
        activations,
        rows,
    }
}
