use lessonsmith::classifier::{ContentType, classify};
use lessonsmith::logger;
use lessonsmith::schema::{quiz_question_count, resolve};

#[test]
fn test_logger_init_is_idempotent() {
    logger::set_log_to_console(false);
    assert!(logger::init().is_ok());
    assert!(logger::init().is_ok());
    logger::disable_logging();
}

#[test]
fn test_public_classification_path() {
    let prompt = "Make a quiz with 15 questions";
    assert_eq!(classify(prompt), ContentType::Quiz);
    assert_eq!(quiz_question_count(prompt), 15);
    assert_eq!(quiz_question_count("Make a quiz"), 20);
    assert!(resolve(ContentType::Quiz, prompt).instruction.as_str().contains("15"));
}
