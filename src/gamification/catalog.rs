use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::progression::ProgressionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum AchievementCriterion {
    LessonsCompleted(u64),
    TotalXp(u64),
    StreakDays(u32),
    CommunityContributions(u64),
    PerfectScores(u64),
    QuizzesPassed(u64),
}

impl AchievementCriterion {
    pub fn target(&self) -> u64 {
        match *self {
            Self::LessonsCompleted(n)
            | Self::TotalXp(n)
            | Self::CommunityContributions(n)
            | Self::PerfectScores(n)
            | Self::QuizzesPassed(n) => n,
            Self::StreakDays(n) => u64::from(n),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementDef {
    pub id: String,
    pub title: String,
    pub description: String,
    pub icon_name: String,
    pub criterion: AchievementCriterion,
    pub reward_xp: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeRarity {
    Common,
    Uncommon,
    Rare,
    Epic,
    Legendary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BadgeCategory {
    Learning,
    Achievement,
    Social,
    Special,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BadgeDef {
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon_name: String,
    pub rarity: BadgeRarity,
    pub category: BadgeCategory,
    pub points_required: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeKind {
    Lesson,
    Quiz,
    Community,
    Streak,
}

impl ChallengeKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "lesson" => Some(Self::Lesson),
            "quiz" => Some(Self::Quiz),
            "community" => Some(Self::Community),
            "streak" => Some(Self::Streak),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeTemplate {
    pub id: String,
    pub title: String,
    pub description: String,
    pub kind: ChallengeKind,
    pub target: u32,
    pub reward_xp: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    pub achievements: Vec<AchievementDef>,
    pub badges: Vec<BadgeDef>,
    pub challenges: Vec<ChallengeTemplate>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Catalog {
    pub fn from_json(raw: &str) -> Result<Self, ProgressionError> {
        let catalog: Catalog = serde_json::from_str(raw)
            .map_err(|e| ProgressionError::InvalidCatalog(e.to_string()))?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn load(path: &Path) -> Result<Self, ProgressionError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ProgressionError::InvalidCatalog(format!("{}: {e}", path.display()))
        })?;
        Self::from_json(&raw)
    }

    pub fn validate(&self) -> Result<(), ProgressionError> {
        ensure_unique("achievement", self.achievements.iter().map(|a| a.id.as_str()))?;
        ensure_unique("badge", self.badges.iter().map(|b| b.id.as_str()))?;
        ensure_unique("challenge", self.challenges.iter().map(|c| c.id.as_str()))?;

        if let Some(a) = self.achievements.iter().find(|a| a.criterion.target() == 0) {
            return Err(ProgressionError::InvalidCatalog(format!(
                "achievement {} has a zero target",
                a.id
            )));
        }
        if let Some(c) = self.challenges.iter().find(|c| c.target == 0) {
            return Err(ProgressionError::InvalidCatalog(format!(
                "challenge {} has a zero target",
                c.id
            )));
        }
        Ok(())
    }

    pub fn achievement(&self, id: &str) -> Option<&AchievementDef> {
        self.achievements.iter().find(|a| a.id == id)
    }

    pub fn badge(&self, id: &str) -> Option<&BadgeDef> {
        self.badges.iter().find(|b| b.id == id)
    }

    pub fn builtin() -> Self {
        Self {
            achievements: vec![
                achievement("premier_pas", "Premier Pas", "Terminez votre première leçon", "footprints", AchievementCriterion::LessonsCompleted(1), 50),
                achievement("apprenti_assidu", "Apprenti Assidu", "Terminez 10 leçons", "book-open", AchievementCriterion::LessonsCompleted(10), 150),
                achievement("erudit", "Érudit", "Terminez 50 leçons", "graduation-cap", AchievementCriterion::LessonsCompleted(50), 500),
                achievement("mille_points", "Mille Points", "Accumulez 1000 XP", "star", AchievementCriterion::TotalXp(1000), 100),
                achievement("collectionneur", "Collectionneur d'XP", "Accumulez 5000 XP", "gem", AchievementCriterion::TotalXp(5000), 300),
                achievement("flamme_naissante", "Flamme Naissante", "Apprenez 3 jours de suite", "flame", AchievementCriterion::StreakDays(3), 50),
                achievement("semaine_parfaite", "Semaine Parfaite", "Apprenez 7 jours de suite", "calendar-check", AchievementCriterion::StreakDays(7), 150),
                achievement("mois_de_feu", "Mois de Feu", "Apprenez 30 jours de suite", "fire", AchievementCriterion::StreakDays(30), 600),
                achievement("perfectionniste", "Perfectionniste", "Obtenez 5 scores parfaits", "target", AchievementCriterion::PerfectScores(5), 200),
                achievement("as_des_quiz", "As des Quiz", "Réussissez 10 quiz", "trophy", AchievementCriterion::QuizzesPassed(10), 150),
                achievement("ambassadeur", "Ambassadeur Culturel", "Partagez 5 contributions avec la communauté", "users", AchievementCriterion::CommunityContributions(5), 100),
            ],
            badges: vec![
                badge("graine", "Graine de Savoir", "Vos 100 premiers XP", "sprout", BadgeRarity::Common, BadgeCategory::Learning, 100),
                badge("jeune_pousse", "Jeune Pousse", "500 XP accumulés", "leaf", BadgeRarity::Uncommon, BadgeCategory::Learning, 500),
                badge("baobab", "Baobab", "2500 XP accumulés", "tree", BadgeRarity::Rare, BadgeCategory::Achievement, 2500),
                badge("griot", "Griot", "10000 XP accumulés", "drum", BadgeRarity::Epic, BadgeCategory::Special, 10_000),
                badge("sage_ancetre", "Sage Ancêtre", "50000 XP accumulés", "crown", BadgeRarity::Legendary, BadgeCategory::Special, 50_000),
            ],
            challenges: vec![
                challenge("daily_lesson", "Leçon Quotidienne", "Complétez une leçon aujourd'hui", ChallengeKind::Lesson, 1, 20),
                challenge("streak_keeper", "Gardien de Série", "Maintenez votre série d'apprentissage", ChallengeKind::Streak, 1, 15),
                challenge("quiz_master", "Maître des Quiz", "Réussissez 2 quiz avec plus de 80%", ChallengeKind::Quiz, 2, 30),
                challenge("village_voice", "Voix du Village", "Partagez une contribution avec la communauté", ChallengeKind::Community, 1, 25),
            ],
        }
    }
}

fn ensure_unique<'a>(
    kind: &str,
    ids: impl Iterator<Item = &'a str>,
) -> Result<(), ProgressionError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(ProgressionError::InvalidCatalog(format!(
                "duplicate {kind} id: {id}"
            )));
        }
    }
    Ok(())
}

fn achievement(
    id: &str,
    title: &str,
    description: &str,
    icon_name: &str,
    criterion: AchievementCriterion,
    reward_xp: u64,
) -> AchievementDef {
    AchievementDef {
        id: id.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        icon_name: icon_name.to_string(),
        criterion,
        reward_xp,
    }
}

fn badge(
    id: &str,
    name: &str,
    description: &str,
    icon_name: &str,
    rarity: BadgeRarity,
    category: BadgeCategory,
    points_required: u64,
) -> BadgeDef {
    BadgeDef {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        icon_name: icon_name.to_string(),
        rarity,
        category,
        points_required,
    }
}

fn challenge(
    id: &str,
    title: &str,
    description: &str,
    kind: ChallengeKind,
    target: u32,
    reward_xp: u64,
) -> ChallengeTemplate {
    ChallengeTemplate {
        id: id.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        kind,
        target,
        reward_xp,
    }
}
