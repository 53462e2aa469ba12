//! Register catalog.
//!
//! Built once from the static per-module declarations in [`crate::modules`].
//! Lookups go through two hash maps keyed by module id and (flag-stripped)
//! register id, so resolving an inbound buffer is O(1).

use std::collections::HashMap;
use std::fmt;

use crate::error::{CatalogError, DecodeError};
use crate::protocol::event::ModuleEvent;
use crate::protocol::wire::READ_FLAG;

/// Pure decoder for one register. Receives the whole inbound buffer,
/// header included. `Ok(None)` means the register carries no payload.
pub type DecodeFn = fn(&[u8]) -> Result<Option<ModuleEvent>, DecodeError>;

/// Decoder for command-only registers.
pub fn no_payload(_data: &[u8]) -> Result<Option<ModuleEvent>, DecodeError> {
    Ok(None)
}

/// Accepted parameter byte counts for one direction of a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// The register cannot be used in this direction.
    Unsupported,
    Exact(usize),
    Between(usize, usize),
    Any,
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Unsupported => false,
            Arity::Exact(n) => count == n,
            Arity::Between(lo, hi) => (lo..=hi).contains(&count),
            Arity::Any => true,
        }
    }

    pub fn describe(self) -> String {
        match self {
            Arity::Unsupported => "no".to_string(),
            Arity::Exact(n) => n.to_string(),
            Arity::Between(lo, hi) => format!("{}..={}", lo, hi),
            Arity::Any => "any number of".to_string(),
        }
    }
}

/// Static declaration of one register.
#[derive(Clone, Copy)]
pub struct RegisterSpec {
    pub id: u8,
    pub name: &'static str,
    pub write: Arity,
    pub read: Arity,
    pub decode: DecodeFn,
}

impl RegisterSpec {
    /// A write-only command register taking any parameters and carrying no
    /// payload back. Refine with the builder methods.
    pub const fn new(id: u8, name: &'static str) -> Self {
        Self {
            id,
            name,
            write: Arity::Any,
            read: Arity::Unsupported,
            decode: no_payload,
        }
    }

    pub const fn write(mut self, arity: Arity) -> Self {
        self.write = arity;
        self
    }

    pub const fn read(mut self, arity: Arity) -> Self {
        self.read = arity;
        self
    }

    pub const fn decode(mut self, decode: DecodeFn) -> Self {
        self.decode = decode;
        self
    }
}

impl fmt::Debug for RegisterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterSpec")
            .field("id", &format_args!("{:#04x}", self.id))
            .field("name", &self.name)
            .field("write", &self.write)
            .field("read", &self.read)
            .finish()
    }
}

/// Static declaration of one module.
#[derive(Debug, Clone, Copy)]
pub struct ModuleSpec {
    pub id: u8,
    pub name: &'static str,
    pub registers: &'static [RegisterSpec],
}

/// A module as resolved by the catalog.
#[derive(Debug, Clone)]
pub struct Module {
    id: u8,
    name: &'static str,
    registers: HashMap<u8, RegisterSpec>,
}

impl Module {
    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Look up a register; the read flag is ignored.
    pub fn register(&self, register: u8) -> Option<&RegisterSpec> {
        self.registers.get(&(register & !READ_FLAG))
    }

    /// Registers ordered by id.
    pub fn registers(&self) -> Vec<&RegisterSpec> {
        let mut regs: Vec<_> = self.registers.values().collect();
        regs.sort_by_key(|r| r.id);
        regs
    }
}

/// Immutable (module, register) → [`RegisterSpec`] table.
#[derive(Debug, Clone)]
pub struct RegisterCatalog {
    modules: HashMap<u8, Module>,
}

impl RegisterCatalog {
    /// Build a catalog, rejecting duplicate module ids, duplicate register ids
    /// within a module and register ids that collide with the read flag.
    pub fn new(specs: &[ModuleSpec]) -> Result<Self, CatalogError> {
        let mut modules = HashMap::with_capacity(specs.len());

        for spec in specs {
            if modules.contains_key(&spec.id) {
                return Err(CatalogError::DuplicateModule(spec.id));
            }

            let mut registers = HashMap::with_capacity(spec.registers.len());
            for reg in spec.registers {
                if reg.id & READ_FLAG != 0 {
                    return Err(CatalogError::RegisterIdOutOfRange {
                        module: spec.id,
                        register: reg.id,
                    });
                }
                if registers.insert(reg.id, *reg).is_some() {
                    return Err(CatalogError::DuplicateRegister {
                        module: spec.id,
                        register: reg.id,
                    });
                }
            }

            modules.insert(
                spec.id,
                Module {
                    id: spec.id,
                    name: spec.name,
                    registers,
                },
            );
        }

        Ok(Self { modules })
    }

    /// Catalog of every module this crate knows about.
    pub fn standard() -> Result<Self, CatalogError> {
        Self::new(crate::modules::ALL)
    }

    pub fn module(&self, id: u8) -> Option<&Module> {
        self.modules.get(&id)
    }

    pub fn module_by_name(&self, name: &str) -> Option<&Module> {
        self.modules
            .values()
            .find(|m| m.name.eq_ignore_ascii_case(name))
    }

    /// Look up a register; the read flag on `register` is ignored.
    pub fn register(&self, module: u8, register: u8) -> Option<&RegisterSpec> {
        self.module(module).and_then(|m| m.register(register))
    }

    /// Modules ordered by id.
    pub fn modules(&self) -> Vec<&Module> {
        let mut mods: Vec<_> = self.modules.values().collect();
        mods.sort_by_key(|m| m.id);
        mods
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: &[RegisterSpec] = &[
        RegisterSpec::new(0x01, "ONE"),
        RegisterSpec::new(0x02, "TWO").read(Arity::Exact(0)),
    ];
    const DUPLICATE_REGS: &[RegisterSpec] =
        &[RegisterSpec::new(0x01, "ONE"), RegisterSpec::new(0x01, "ALSO_ONE")];
    const FLAGGED: &[RegisterSpec] = &[RegisterSpec::new(0x81, "BAD")];

    #[test]
    fn test_standard_catalog_builds() {
        let catalog = RegisterCatalog::standard().unwrap();
        assert!(catalog.module(0x05).is_some());
        assert_eq!(catalog.module(0x05).unwrap().name(), "gpio");
        assert!(catalog.module(0xAA).is_none());
    }

    #[test]
    fn test_standard_catalog_is_unique() {
        // Every module id and every register id inside a module is unique
        let mut seen = std::collections::HashSet::new();
        for spec in crate::modules::ALL {
            assert!(seen.insert(spec.id), "module {:#04x} repeated", spec.id);
            let mut regs = std::collections::HashSet::new();
            for reg in spec.registers {
                assert!(regs.insert(reg.id), "{}:{:#04x} repeated", spec.name, reg.id);
            }
        }
    }

    #[test]
    fn test_duplicate_module_is_rejected() {
        let specs = [
            ModuleSpec { id: 0x01, name: "a", registers: A },
            ModuleSpec { id: 0x01, name: "b", registers: A },
        ];
        assert_eq!(
            RegisterCatalog::new(&specs).unwrap_err(),
            CatalogError::DuplicateModule(0x01)
        );
    }

    #[test]
    fn test_duplicate_register_is_rejected() {
        let specs = [ModuleSpec { id: 0x02, name: "a", registers: DUPLICATE_REGS }];
        assert_eq!(
            RegisterCatalog::new(&specs).unwrap_err(),
            CatalogError::DuplicateRegister {
                module: 0x02,
                register: 0x01
            }
        );
    }

    #[test]
    fn test_flagged_register_id_is_rejected() {
        let specs = [ModuleSpec { id: 0x03, name: "a", registers: FLAGGED }];
        assert!(matches!(
            RegisterCatalog::new(&specs),
            Err(CatalogError::RegisterIdOutOfRange { .. })
        ));
    }

    #[test]
    fn test_lookup_strips_read_flag() {
        let specs = [ModuleSpec { id: 0x01, name: "a", registers: A }];
        let catalog = RegisterCatalog::new(&specs).unwrap();
        assert_eq!(catalog.register(0x01, 0x82).unwrap().name, "TWO");
        assert_eq!(catalog.register(0x01, 0x02).unwrap().name, "TWO");
        assert!(catalog.register(0x01, 0x03).is_none());
        assert!(catalog.register(0x09, 0x01).is_none());
    }

    #[test]
    fn test_arity() {
        assert!(Arity::Exact(1).accepts(1));
        assert!(!Arity::Exact(1).accepts(2));
        assert!(Arity::Between(1, 3).accepts(3));
        assert!(!Arity::Between(1, 3).accepts(0));
        assert!(Arity::Any.accepts(0));
        assert!(!Arity::Unsupported.accepts(0));
    }
}
