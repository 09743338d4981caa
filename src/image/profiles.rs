// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Named profiles and properties on the head frame.

use super::Image;
use crate::engine::{Engine, NativeFrame};
use crate::error::{Capability, Error, Result};

const COLOR_PROFILE: &str = "icc";
const IPTC_PROFILE: &str = "8bim";

fn is_builtin(name: &str) -> bool {
    name.eq_ignore_ascii_case(COLOR_PROFILE) || name.eq_ignore_ascii_case(IPTC_PROFILE)
}

impl<E: Engine> Image<E> {
    fn check_profile_name(&self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::InvalidArgument("profile name is empty".into()));
        }
        if !is_builtin(name) {
            self.require(Capability::GenericProfiles)?;
        }
        Ok(())
    }

    /// A copy of the profile stored under `name`, if any.
    ///
    /// Names other than `"icc"` and `"8bim"` need
    /// [`Capability::GenericProfiles`].
    pub fn profile(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let head = self.head("profile")?;
        self.check_profile_name(name)?;
        Ok(head.profile(name).map(<[u8]>::to_vec))
    }

    /// Stores `data` under `name`. `None` (or an empty slice) removes the profile.
    pub fn set_profile(&mut self, name: &str, data: Option<&[u8]>) -> Result<()> {
        self.list("set_profile")?;
        self.check_profile_name(name)?;
        self.with_head_mut("set_profile", |_, head| head.set_profile(name, data))
    }

    /// Names of every attached profile.
    pub fn profile_names(&self) -> Result<Vec<String>> {
        let head = self.head("profile_names")?;
        self.require(Capability::ProfileIteration)?;
        Ok(head.profile_names())
    }

    pub fn color_profile(&self) -> Result<Option<Vec<u8>>> {
        self.profile(COLOR_PROFILE)
    }

    pub fn set_color_profile(&mut self, data: Option<&[u8]>) -> Result<()> {
        self.set_profile(COLOR_PROFILE, data)
    }

    pub fn iptc_profile(&self) -> Result<Option<Vec<u8>>> {
        self.profile(IPTC_PROFILE)
    }

    pub fn set_iptc_profile(&mut self, data: Option<&[u8]>) -> Result<()> {
        self.set_profile(IPTC_PROFILE, data)
    }

    pub fn property(&self, name: &str) -> Result<Option<String>> {
        let head = self.head("property")?;
        self.require(Capability::Properties)?;
        Ok(head.property(name))
    }

    pub fn set_property(&mut self, name: &str, value: &str) -> Result<()> {
        self.list("set_property")?;
        self.require(Capability::Properties)?;
        if name.is_empty() {
            return Err(Error::InvalidArgument("property name is empty".into()));
        }
        self.with_head_mut("set_property", |_, head| head.set_property(name, value))
    }
}
