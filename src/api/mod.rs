use crate::AppState;
use axum::Router;

mod consent;
mod documents;
mod error;
mod home;
mod signals;
mod viewers;

pub use error::ApiError;

pub fn routes(base_path: &str) -> Router<AppState> {
	let router = Router::new()
		.merge(home::routes())
		.merge(consent::routes())
		.merge(documents::routes())
		.merge(viewers::routes())
		.merge(signals::routes());

	// axum no longer supports nesting at the root
	match base_path {
		"/" | "" => router,
		base_path => Router::new().nest(base_path, router),
	}
}
