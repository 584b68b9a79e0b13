//! Program images as text: decimal words separated by commas and/or
//! whitespace.

use num_bigint::BigInt;

#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("word {index} is not a decimal integer: {text:?}")]
    BadWord { index: usize, text: String },
    #[error("image has no words")]
    Empty,
}

pub fn parse(text: &str) -> Result<Vec<BigInt>, ImageError> {
    let words = text
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .enumerate()
        .map(|(index, w)| {
            w.parse::<BigInt>().map_err(|_| ImageError::BadWord { index, text: w.to_string() })
        })
        .collect::<Result<Vec<_>, _>>()?;
    if words.is_empty() {
        return Err(ImageError::Empty);
    }
    Ok(words)
}

pub fn render(words: &[BigInt]) -> String {
    words.iter().map(BigInt::to_string).collect::<Vec<_>>().join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commas_and_newlines_both_separate() {
        let words = parse("1,2\n3, 4\r\n,99\n").unwrap();
        let expected: Vec<BigInt> = [1, 2, 3, 4, 99].into_iter().map(BigInt::from).collect();
        assert_eq!(words, expected);
    }

    #[test]
    fn keeps_big_and_negative_words() {
        let words = parse("-5,1125899906842624000").unwrap();
        assert_eq!(words[0], BigInt::from(-5));
        assert_eq!(words[1], "1125899906842624000".parse::<BigInt>().unwrap());
        assert_eq!(render(&words), "-5,1125899906842624000");
    }

    #[test]
    fn bad_word_is_located() {
        let err = parse("1,2,x3,4").unwrap_err();
        assert!(matches!(err, ImageError::BadWord { index: 2, ref text } if text == "x3"));
    }

    #[test]
    fn blank_image_is_rejected() {
        assert!(matches!(parse(" \n ,"), Err(ImageError::Empty)));
    }
}
