use crate::config::ViewerConfig;
use serde::Serialize;

/// Zoom and pagination of the current document.
///
/// Every mutator returns whether the current page has to be rendered again.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageControls {
	scale: f64,
	min_scale: f64,
	max_scale: f64,
	#[serde(skip)]
	step: f64,
	page: u32,
	total_pages: u32,
}

impl PageControls {
	pub fn new(config: &ViewerConfig) -> Self {
		let min_scale = config.min_scale.min(config.max_scale);
		let max_scale = config.max_scale.max(config.min_scale);
		Self {
			scale: 1.0_f64.clamp(min_scale, max_scale),
			min_scale,
			max_scale,
			step: config.scale_step.abs(),
			page: 1,
			total_pages: 1,
		}
	}

	pub const fn scale(&self) -> f64 {
		self.scale
	}

	pub const fn page(&self) -> u32 {
		self.page
	}

	pub const fn total_pages(&self) -> u32 {
		self.total_pages
	}

	pub fn set_scale(&mut self, scale: f64) -> bool {
		if scale.is_nan() {
			return false;
		}
		let scale = scale.clamp(self.min_scale, self.max_scale);
		let changed = (scale - self.scale).abs() > f64::EPSILON;
		self.scale = scale;
		changed
	}

	pub fn zoom_in(&mut self) -> bool {
		self.set_scale(self.scale + self.step)
	}

	pub fn zoom_out(&mut self) -> bool {
		self.set_scale(self.scale - self.step)
	}

	pub fn go_to(&mut self, page: u32) -> bool {
		let page = page.clamp(1, self.total_pages);
		let changed = page != self.page;
		self.page = page;
		changed
	}

	pub fn next_page(&mut self) -> bool {
		self.go_to(self.page.saturating_add(1))
	}

	pub fn previous_page(&mut self) -> bool {
		self.go_to(self.page.saturating_sub(1))
	}

	/// Called once the render surface knows the page count. Zero is treated as one page.
	pub fn set_total_pages(&mut self, total_pages: u32) -> bool {
		self.total_pages = total_pages.max(1);
		let page = self.page;
		self.go_to(page)
	}

	/// Back to the first page at the default scale, e.g. when a new document is opened.
	pub fn reset(&mut self) {
		self.scale = 1.0_f64.clamp(self.min_scale, self.max_scale);
		self.page = 1;
		self.total_pages = 1;
	}
}
