/*!
 * Subtitle translation.
 *
 * - `throttle`: bounded FIFO queue in front of the translation backend
 * - `memo`: bounded memo of previous translations
 * - `stage`: line extraction, deduplication and reassembly
 */

pub use self::memo::TranslationMemo;
pub use self::stage::{ProgressFn, TranslatedSubtitle, TranslationStage};
pub use self::throttle::TranslationThrottle;

pub mod memo;
pub mod stage;
pub mod throttle;
