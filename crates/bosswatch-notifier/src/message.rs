use bosswatch_core::clock::ManilaTime;
use bosswatch_core::{Boss, BossType};
use bosswatch_scheduler::respawn::{compare_for_display, format_next_respawn};

/// Build the daily schedule post.
///
/// One section per boss type in [`BossType::ORDER`], skipping empty ones.
/// Each section is a bold header, a blank line, one bullet per boss sorted
/// by next respawn, and a trailing blank line; the whole text is trimmed.
pub fn compose_schedule_message(bosses: &[Boss], today_key: &str, now: &ManilaTime) -> String {
    let mut lines: Vec<String> = Vec::new();

    for boss_type in BossType::ORDER {
        let mut group: Vec<&Boss> = bosses.iter().filter(|b| b.boss_type == boss_type).collect();
        if group.is_empty() {
            continue;
        }
        group.sort_by(|a, b| compare_for_display(a, b, now));

        lines.push(format!("**{} Schedule ({today_key})**", boss_type.label()));
        lines.push(String::new());
        for boss in group {
            lines.push(format!(
                "• **{}** — {}",
                boss.name,
                format_next_respawn(boss, now)
            ));
        }
        lines.push(String::new());
    }

    lines.join("\n").trim().to_string()
}
