mod category;
mod payload;
mod record;
mod template;

pub use category::{Category, MenuType, SlotKey, WorkoutType};
pub use payload::{ExerciseLog, Macros, MealItem, NutritionPayload, Payload, SetLog, WorkoutPayload};
pub use record::{LogRecord, NewLogRecord, RecordPatch};
pub use template::{ExerciseTemplate, MealItemTemplate, MealTemplate, Templates};
