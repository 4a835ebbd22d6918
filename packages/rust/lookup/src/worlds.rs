//! The fixed catalog of valid world names.

/// Every world a character search may be scoped to, grouped by data center.
pub const WORLDS: &[&str] = &[
    // Aether
    "Adamantoise", "Cactuar", "Faerie", "Gilgamesh", "Jenova", "Midgardsormr", "Sargatanas",
    "Siren",
    // Primal
    "Behemoth", "Excalibur", "Exodus", "Famfrit", "Hyperion", "Lamia", "Leviathan", "Ultros",
    // Crystal
    "Balmung", "Brynhildr", "Coeurl", "Diabolos", "Goblin", "Malboro", "Mateus", "Zalera",
    // Dynamis
    "Cuchulainn", "Golem", "Halicarnassus", "Kraken", "Maduin", "Marilith", "Rafflesia",
    "Seraph",
    // Chaos
    "Cerberus", "Louisoix", "Moogle", "Omega", "Phantom", "Ragnarok", "Sagittarius", "Spriggan",
    // Light
    "Alpha", "Lich", "Odin", "Phoenix", "Raiden", "Shiva", "Twintania", "Zodiark",
    // Materia
    "Bismarck", "Ravana", "Sephirot", "Sophia", "Zurvan",
    // Elemental
    "Aegis", "Atomos", "Carbuncle", "Garuda", "Gungnir", "Kujata", "Tonberry", "Typhon",
    // Gaia
    "Alexander", "Bahamut", "Durandal", "Fenrir", "Ifrit", "Ridill", "Tiamat", "Ultima",
    // Mana
    "Anima", "Asura", "Chocobo", "Hades", "Ixion", "Masamune", "Pandaemonium", "Titan",
    // Meteor
    "Belias", "Mandragora", "Ramuh", "Shinryu", "Unicorn", "Valefor", "Yojimbo", "Zeromus",
];

/// Case-insensitive lookup returning the canonical spelling.
pub fn canonical_world(name: &str) -> Option<&'static str> {
    let name = name.trim();
    WORLDS.iter().copied().find(|w| w.eq_ignore_ascii_case(name))
}
