//! Printing through an embedded render surface.
//!
//! Embedded frames do not reliably expose a printable browsing context: some refuse access to
//! the inner window, some lack a document-level print command. Printing therefore walks an
//! ordered list of [`PrintStrategy`]s and stops at the first that succeeds.

use crate::utils::lock;
use serde::Serialize;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, error, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PrintError {
	#[error("{0} is not available")]
	Unavailable(&'static str),
	#[error("print failed: {0}")]
	Failed(String),
	#[error("all print strategies failed")]
	Exhausted,
}

/// The browsing context inside an embedded render surface.
pub trait FrameWindow {
	fn focus(&self) -> Result<(), PrintError>;

	fn print(&self) -> Result<(), PrintError>;
}

/// The display mechanism a document is rendered into.
pub trait RenderSurface: Send + Sync {
	/// The surface's inner window, if the host allows access to it.
	fn frame_window(&self) -> Option<&dyn FrameWindow>;

	/// Runs the surface document's own print command.
	fn exec_print_command(&self) -> Result<(), PrintError>;

	/// Prints the top-level browsing context.
	fn print_top_level(&self) -> Result<(), PrintError>;
}

pub trait PrintStrategy: Send + Sync {
	fn name(&self) -> &'static str;

	fn print(&self, surface: &dyn RenderSurface) -> Result<(), PrintError>;
}

/// Focuses the surface's inner window and prints it.
pub struct FrameWindowPrint;

impl PrintStrategy for FrameWindowPrint {
	fn name(&self) -> &'static str {
		"frame-window"
	}

	fn print(&self, surface: &dyn RenderSurface) -> Result<(), PrintError> {
		let window = surface
			.frame_window()
			.ok_or(PrintError::Unavailable("frame window"))?;
		window.focus()?;
		window.print()
	}
}

pub struct DocumentCommandPrint;

impl PrintStrategy for DocumentCommandPrint {
	fn name(&self) -> &'static str {
		"document-command"
	}

	fn print(&self, surface: &dyn RenderSurface) -> Result<(), PrintError> {
		surface.exec_print_command()
	}
}

pub struct TopLevelPrint;

impl PrintStrategy for TopLevelPrint {
	fn name(&self) -> &'static str {
		"top-level"
	}

	fn print(&self, surface: &dyn RenderSurface) -> Result<(), PrintError> {
		surface.print_top_level()
	}
}

/// Strategies for PDFs shown in an embedded frame.
pub const PDF_STRATEGIES: &[&dyn PrintStrategy] =
	&[&FrameWindowPrint, &DocumentCommandPrint, &TopLevelPrint];

/// Images are part of the host page, so only the top-level context can print them.
pub const IMAGE_STRATEGIES: &[&dyn PrintStrategy] = &[&TopLevelPrint];

/// Tries each strategy in order. Returns the name of the one that printed.
pub fn print_with_fallback(
	surface: &dyn RenderSurface,
	strategies: &[&dyn PrintStrategy],
) -> Result<&'static str, PrintError> {
	for strategy in strategies {
		match strategy.print(surface) {
			Ok(()) => {
				debug!(strategy = strategy.name(), "Printed document");
				return Ok(strategy.name());
			}
			Err(err) => warn!(strategy = strategy.name(), "Print strategy failed: {err}"),
		}
	}
	Err(PrintError::Exhausted)
}

/// Like [`print_with_fallback`], but a total failure is only logged.
pub fn print_best_effort(
	surface: &dyn RenderSurface,
	strategies: &[&dyn PrintStrategy],
) -> Option<&'static str> {
	print_with_fallback(surface, strategies)
		.map_err(|err| error!("Failed to print document: {err}"))
		.ok()
}

/// What a remote client has to print on its side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PrintJob {
	/// Run the embedded document's print command.
	Document,
	/// Print the whole page.
	TopLevel,
}

/// Render surface of a remote client.
///
/// The inner window is out of reach, so print requests are queued until the client collects
/// them with [`PrintQueue::take`].
#[derive(Debug, Default)]
pub struct PrintQueue {
	jobs: Mutex<Vec<PrintJob>>,
}

impl PrintQueue {
	pub fn take(&self) -> Vec<PrintJob> {
		std::mem::take(&mut *lock(&self.jobs))
	}
}

impl RenderSurface for PrintQueue {
	fn frame_window(&self) -> Option<&dyn FrameWindow> {
		None
	}

	fn exec_print_command(&self) -> Result<(), PrintError> {
		lock(&self.jobs).push(PrintJob::Document);
		Ok(())
	}

	fn print_top_level(&self) -> Result<(), PrintError> {
		lock(&self.jobs).push(PrintJob::TopLevel);
		Ok(())
	}
}
