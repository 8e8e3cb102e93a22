//! Human-readable group labels built from member bios.

use crate::domain::entities::UserRecord;

const MIN_WORD_CHARS: usize = 5;
const MAX_LABEL_WORDS: usize = 3;
const STRIPPED: [char; 4] = [',', '.', '\'', '"'];

/// Build a short label from the members' descriptions.
///
/// Each member contributes at most its first word of five or more characters,
/// punctuation-stripped and title-cased. Words are joined as
/// `"First's Second Third"`; members without such a word are skipped.
pub fn describe(members: &[UserRecord]) -> String {
    let mut label = String::new();
    let mut words = 0;

    for member in members {
        let Some(word) = member
            .description_text()
            .split(' ')
            .map(clean_word)
            .find(|word| word.chars().count() >= MIN_WORD_CHARS)
        else {
            continue;
        };

        label.push_str(&word);
        match words {
            0 => label.push_str("'s "),
            1 => label.push(' '),
            _ => {}
        }
        words += 1;
        if words >= MAX_LABEL_WORDS {
            break;
        }
    }

    label
}

fn clean_word(raw: &str) -> String {
    let stripped: String = raw.chars().filter(|c| !STRIPPED.contains(c)).collect();
    title_case(&stripped)
}

/// Upper-case the first letter of every alphabetic run, lower-case the rest.
fn title_case(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    let mut previous_alphabetic = false;
    for c in word.chars() {
        if c.is_alphabetic() {
            if previous_alphabetic {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            previous_alphabetic = true;
        } else {
            out.push(c);
            previous_alphabetic = false;
        }
    }
    out
}
