//! Small utility helpers used across modules: emoji glyph handling and text tidying.

use std::collections::BTreeSet;

const ZWJ: char = '\u{200D}';

/// True if the unicode char is an emoji or pictographic base glyph.
/// Covers pictographs, dingbats, geometric shapes and regional indicators.
pub fn is_emoji(ch: char) -> bool {
  let c = ch as u32;
  ((0x1F000..=0x1FAFF).contains(&c) && !is_skin_tone(ch))
    || (0x2600..=0x27BF).contains(&c)
    || (0x2B00..=0x2BFF).contains(&c)
    || (0x25A0..=0x25FF).contains(&c)
    || (0x2300..=0x23FF).contains(&c)
}

fn is_skin_tone(ch: char) -> bool {
  ('\u{1F3FB}'..='\u{1F3FF}').contains(&ch)
}

fn is_regional_indicator(ch: char) -> bool {
  ('\u{1F1E6}'..='\u{1F1FF}').contains(&ch)
}

/// Characters that decorate the previous glyph instead of starting a new one.
fn is_glyph_modifier(ch: char) -> bool {
  matches!(ch, '\u{FE0E}' | '\u{FE0F}' | '\u{20E3}')
    || is_skin_tone(ch)
    || ('\u{E0020}'..='\u{E007F}').contains(&ch)
}

/// Split text into emoji glyph clusters (ZWJ sequences, flags and
/// modifier-decorated glyphs count as one). Non-emoji text is skipped.
pub fn emoji_glyphs(s: &str) -> Vec<String> {
  let mut glyphs = Vec::new();
  let mut current = String::new();
  let mut joining = false;

  for ch in s.chars() {
    if !current.is_empty() && is_glyph_modifier(ch) {
      current.push(ch);
      continue;
    }
    if ch == ZWJ && !current.is_empty() {
      current.push(ch);
      joining = true;
      continue;
    }
    if is_emoji(ch) {
      let pairs_flag = is_regional_indicator(ch)
        && current.chars().count() == 1
        && current.chars().all(is_regional_indicator);
      if joining || pairs_flag {
        current.push(ch);
        joining = false;
        continue;
      }
      if !current.is_empty() {
        glyphs.push(std::mem::take(&mut current));
      }
      current.push(ch);
      continue;
    }
    joining = false;
    if !current.is_empty() {
      glyphs.push(std::mem::take(&mut current));
    }
  }
  if !current.is_empty() {
    glyphs.push(current);
  }
  glyphs
}

pub fn count_glyphs(s: &str) -> usize {
  emoji_glyphs(s).len()
}

/// First glyph found in the text, if any.
pub fn first_glyph(s: &str) -> Option<String> {
  emoji_glyphs(s).into_iter().next()
}

/// Remove every glyph that appears in `visual` from `text`, then tidy spacing.
pub fn strip_visual_glyphs(text: &str, visual: &str) -> String {
  let distinct: BTreeSet<String> = emoji_glyphs(visual).into_iter().collect();
  if distinct.is_empty() {
    return text.to_string();
  }
  let mut out = text.to_string();
  // Longest first so ZWJ sequences go before their component glyphs.
  let mut ordered: Vec<&String> = distinct.iter().collect();
  ordered.sort_by_key(|g| std::cmp::Reverse(g.len()));
  for glyph in ordered {
    out = out.replace(glyph.as_str(), "");
    let bare: String = glyph.chars().filter(|c| *c != '\u{FE0F}').collect();
    if !bare.is_empty() && bare != *glyph {
      out = out.replace(bare.as_str(), "");
    }
  }
  tidy_spacing(&out)
}

/// True if `text` still carries a glyph that the visual also shows.
pub fn shares_glyphs(text: &str, visual: &str) -> bool {
  let in_visual: BTreeSet<String> = emoji_glyphs(visual).into_iter().collect();
  emoji_glyphs(text).iter().any(|g| in_visual.contains(g))
}

/// Collapse whitespace runs and remove spaces left before punctuation.
pub fn tidy_spacing(s: &str) -> String {
  let collapsed = s.split_whitespace().collect::<Vec<_>>().join(" ");
  let mut out = String::with_capacity(collapsed.len());
  for ch in collapsed.chars() {
    if matches!(ch, '?' | '!' | '.' | ',' | ':' | ';') && out.ends_with(' ') {
      out.pop();
    }
    out.push(ch);
  }
  out
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge model payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.chars().count() <= max {
    s.to_string()
  } else {
    let head: String = s.chars().take(max).collect();
    format!("{}… ({} bytes total)", head, s.len())
  }
}
