//! The action table: one entry per opcode with its name, stack effect,
//! first version, handler and disassembly formatter.

mod arithmetic;
mod control;
mod movie;
mod objects;
mod operands;
mod strings;
mod variables;

pub(crate) use control::try_flags;
pub(crate) use operands::record;

use crate::{
    ActionSpec, Context, StackEffect, StringId, Value,
    disasm::{
        format_constant_pool, format_define_function, format_define_function2, format_get_url,
        format_goto_frame2, format_jump, format_none, format_push, format_string, format_try,
        format_u8, format_u16, format_wait_for_frame,
    },
};

const fn fixed(consumed: u8, produced: u8) -> StackEffect {
    StackEffect::fixed(consumed, produced)
}

const fn dynamic(consumed: Option<u8>, produced: Option<u8>) -> StackEffect {
    StackEffect::dynamic(consumed, produced)
}

#[rustfmt::skip]
pub const ACTIONS: &[ActionSpec] = &[
    ActionSpec::new(0x04, "NextFrame", fixed(0, 0), 1, movie::next_frame, format_none),
    ActionSpec::new(0x05, "PreviousFrame", fixed(0, 0), 1, movie::previous_frame, format_none),
    ActionSpec::new(0x06, "Play", fixed(0, 0), 1, movie::play, format_none),
    ActionSpec::new(0x07, "Stop", fixed(0, 0), 1, movie::stop, format_none),
    ActionSpec::new(0x08, "ToggleQuality", fixed(0, 0), 1, movie::toggle_quality, format_none),
    ActionSpec::new(0x09, "StopSounds", fixed(0, 0), 2, movie::stop_sounds, format_none),
    ActionSpec::new(0x0A, "Add", fixed(2, 1), 4, arithmetic::add, format_none),
    ActionSpec::new(0x0B, "Subtract", fixed(2, 1), 4, arithmetic::subtract, format_none),
    ActionSpec::new(0x0C, "Multiply", fixed(2, 1), 4, arithmetic::multiply, format_none),
    ActionSpec::new(0x0D, "Divide", fixed(2, 1), 4, arithmetic::divide, format_none),
    ActionSpec::new(0x0E, "Equals", fixed(2, 1), 4, arithmetic::equals, format_none),
    ActionSpec::new(0x0F, "Less", fixed(2, 1), 4, arithmetic::less, format_none),
    ActionSpec::new(0x10, "And", fixed(2, 1), 4, arithmetic::and, format_none),
    ActionSpec::new(0x11, "Or", fixed(2, 1), 4, arithmetic::or, format_none),
    ActionSpec::new(0x12, "Not", fixed(1, 1), 4, arithmetic::not, format_none),
    ActionSpec::new(0x13, "StringEquals", fixed(2, 1), 4, strings::string_equals, format_none),
    ActionSpec::new(0x14, "StringLength", fixed(1, 1), 4, strings::string_length, format_none),
    ActionSpec::new(0x15, "StringExtract", fixed(3, 1), 4, strings::string_extract, format_none),
    ActionSpec::new(0x17, "Pop", fixed(1, 0), 4, operands::pop, format_none),
    ActionSpec::new(0x18, "ToInteger", fixed(1, 1), 4, arithmetic::to_integer, format_none),
    ActionSpec::new(0x1C, "GetVariable", fixed(1, 1), 4, variables::get_variable, format_none),
    ActionSpec::new(0x1D, "SetVariable", fixed(2, 0), 4, variables::set_variable, format_none),
    ActionSpec::new(0x20, "SetTarget2", fixed(1, 0), 4, movie::set_target2, format_none),
    ActionSpec::new(0x21, "StringAdd", fixed(2, 1), 4, strings::string_add, format_none),
    ActionSpec::new(0x22, "GetProperty", fixed(2, 1), 4, movie::get_property, format_none),
    ActionSpec::new(0x23, "SetProperty", fixed(3, 0), 4, movie::set_property, format_none),
    ActionSpec::new(0x24, "CloneSprite", fixed(3, 0), 4, movie::clone_sprite, format_none),
    ActionSpec::new(0x25, "RemoveSprite", fixed(1, 0), 4, movie::remove_sprite, format_none),
    ActionSpec::new(0x26, "Trace", fixed(1, 0), 4, movie::trace, format_none),
    ActionSpec::new(0x27, "StartDrag", dynamic(None, Some(0)), 4, movie::start_drag, format_none),
    ActionSpec::new(0x28, "EndDrag", fixed(0, 0), 4, movie::end_drag, format_none),
    ActionSpec::new(0x29, "StringLess", fixed(2, 1), 4, strings::string_less, format_none),
    ActionSpec::new(0x2A, "Throw", fixed(1, 0), 7, control::throw, format_none),
    ActionSpec::new(0x2B, "CastOp", fixed(2, 1), 7, objects::cast_op, format_none),
    ActionSpec::new(0x2C, "ImplementsOp", dynamic(None, Some(0)), 7, objects::implements_op, format_none),
    ActionSpec::new(0x30, "RandomNumber", fixed(1, 1), 4, arithmetic::random_number, format_none),
    ActionSpec::new(0x31, "MBStringLength", fixed(1, 1), 4, strings::mb_string_length, format_none),
    ActionSpec::new(0x32, "CharToAscii", fixed(1, 1), 4, strings::char_to_ascii, format_none),
    ActionSpec::new(0x33, "AsciiToChar", fixed(1, 1), 4, strings::ascii_to_char, format_none),
    ActionSpec::new(0x34, "GetTime", fixed(0, 1), 4, arithmetic::get_time, format_none),
    ActionSpec::new(0x35, "MBStringExtract", fixed(3, 1), 4, strings::mb_string_extract, format_none),
    ActionSpec::new(0x36, "MBCharToAscii", fixed(1, 1), 4, strings::mb_char_to_ascii, format_none),
    ActionSpec::new(0x37, "MBAsciiToChar", fixed(1, 1), 4, strings::mb_ascii_to_char, format_none),
    ActionSpec::new(0x3A, "Delete", fixed(2, 1), 5, variables::delete, format_none),
    ActionSpec::new(0x3B, "Delete2", fixed(1, 1), 5, variables::delete2, format_none),
    ActionSpec::new(0x3C, "DefineLocal", fixed(2, 0), 5, variables::define_local, format_none),
    ActionSpec::new(0x3D, "CallFunction", dynamic(None, Some(1)), 5, control::call_function, format_none),
    ActionSpec::new(0x3E, "Return", dynamic(Some(1), None), 5, control::return_, format_none),
    ActionSpec::new(0x3F, "Modulo", fixed(2, 1), 5, arithmetic::modulo, format_none),
    ActionSpec::new(0x40, "NewObject", dynamic(None, Some(1)), 5, objects::new_object, format_none),
    ActionSpec::new(0x41, "DefineLocal2", fixed(1, 0), 5, variables::define_local2, format_none),
    ActionSpec::new(0x42, "InitArray", dynamic(None, Some(1)), 5, objects::init_array, format_none),
    ActionSpec::new(0x43, "InitObject", dynamic(None, Some(1)), 5, objects::init_object, format_none),
    ActionSpec::new(0x44, "TypeOf", fixed(1, 1), 5, variables::type_of, format_none),
    ActionSpec::new(0x45, "TargetPath", fixed(1, 1), 5, movie::target_path, format_none),
    ActionSpec::new(0x46, "Enumerate", dynamic(Some(1), None), 5, objects::enumerate, format_none),
    ActionSpec::new(0x47, "Add2", fixed(2, 1), 5, arithmetic::add2, format_none),
    ActionSpec::new(0x48, "Less2", fixed(2, 1), 5, arithmetic::less2, format_none),
    ActionSpec::new(0x49, "Equals2", fixed(2, 1), 5, arithmetic::equals2, format_none),
    ActionSpec::new(0x4A, "ToNumber", fixed(1, 1), 5, arithmetic::to_number, format_none),
    ActionSpec::new(0x4B, "ToString", fixed(1, 1), 5, arithmetic::to_string, format_none),
    ActionSpec::new(0x4C, "PushDuplicate", fixed(1, 2), 5, operands::push_duplicate, format_none),
    ActionSpec::new(0x4D, "StackSwap", fixed(2, 2), 5, operands::stack_swap, format_none),
    ActionSpec::new(0x4E, "GetMember", fixed(2, 1), 5, objects::get_member, format_none),
    ActionSpec::new(0x4F, "SetMember", fixed(3, 0), 5, objects::set_member, format_none),
    ActionSpec::new(0x50, "Increment", fixed(1, 1), 5, arithmetic::increment, format_none),
    ActionSpec::new(0x51, "Decrement", fixed(1, 1), 5, arithmetic::decrement, format_none),
    ActionSpec::new(0x52, "CallMethod", dynamic(None, Some(1)), 5, control::call_method, format_none),
    ActionSpec::new(0x53, "NewMethod", dynamic(None, Some(1)), 5, objects::new_method, format_none),
    ActionSpec::new(0x54, "InstanceOf", fixed(2, 1), 6, objects::instance_of, format_none),
    ActionSpec::new(0x55, "Enumerate2", dynamic(Some(1), None), 6, objects::enumerate2, format_none),
    ActionSpec::new(0x60, "BitAnd", fixed(2, 1), 5, arithmetic::bit_and, format_none),
    ActionSpec::new(0x61, "BitOr", fixed(2, 1), 5, arithmetic::bit_or, format_none),
    ActionSpec::new(0x62, "BitXor", fixed(2, 1), 5, arithmetic::bit_xor, format_none),
    ActionSpec::new(0x63, "BitLShift", fixed(2, 1), 5, arithmetic::bit_lshift, format_none),
    ActionSpec::new(0x64, "BitRShift", fixed(2, 1), 5, arithmetic::bit_rshift, format_none),
    ActionSpec::new(0x65, "BitURShift", fixed(2, 1), 5, arithmetic::bit_urshift, format_none),
    ActionSpec::new(0x66, "StrictEquals", fixed(2, 1), 6, arithmetic::strict_equals, format_none),
    ActionSpec::new(0x67, "Greater", fixed(2, 1), 6, arithmetic::greater, format_none),
    ActionSpec::new(0x68, "StringGreater", fixed(2, 1), 6, strings::string_greater, format_none),
    ActionSpec::new(0x69, "Extends", fixed(2, 0), 7, objects::extends, format_none),
    ActionSpec::new(0x81, "GotoFrame", fixed(0, 0), 1, movie::goto_frame, format_u16),
    ActionSpec::new(0x83, "GetURL", fixed(0, 0), 1, movie::get_url, format_get_url),
    ActionSpec::new(0x87, "StoreRegister", fixed(1, 1), 5, operands::store_register, format_u8),
    ActionSpec::new(0x88, "ConstantPool", fixed(0, 0), 5, operands::constant_pool, format_constant_pool),
    ActionSpec::new(0x8A, "WaitForFrame", fixed(0, 0), 1, movie::wait_for_frame, format_wait_for_frame),
    ActionSpec::new(0x8B, "SetTarget", fixed(0, 0), 1, movie::set_target, format_string),
    ActionSpec::new(0x8C, "GotoLabel", fixed(0, 0), 3, movie::goto_label, format_string),
    ActionSpec::new(0x8D, "WaitForFrame2", fixed(1, 0), 4, movie::wait_for_frame2, format_u8),
    ActionSpec::new(0x8E, "DefineFunction2", dynamic(Some(0), None), 7, control::define_function2, format_define_function2),
    ActionSpec::new(0x8F, "Try", fixed(0, 0), 7, control::try_, format_try),
    ActionSpec::new(0x94, "With", fixed(1, 0), 5, control::with, format_u16),
    ActionSpec::new(0x96, "Push", dynamic(Some(0), None), 4, operands::push, format_push),
    ActionSpec::new(0x99, "Jump", fixed(0, 0), 4, control::jump, format_jump),
    ActionSpec::new(0x9A, "GetURL2", fixed(2, 0), 4, movie::get_url2, format_u8),
    ActionSpec::new(0x9B, "DefineFunction", dynamic(Some(0), None), 5, control::define_function, format_define_function),
    ActionSpec::new(0x9D, "If", fixed(1, 0), 4, control::if_, format_jump),
    ActionSpec::new(0x9E, "Call", dynamic(Some(1), None), 4, movie::call, format_none),
    ActionSpec::new(0x9F, "GotoFrame2", fixed(1, 0), 4, movie::goto_frame2, format_goto_frame2),
];

const NONE: u8 = u8::MAX;

const INDEX: [u8; 256] = {
    let mut index = [NONE; 256];
    let mut i = 0;
    while i < ACTIONS.len() {
        index[ACTIONS[i].code as usize] = i as u8;
        i += 1;
    }
    index
};

/// The table entry for `code`, if the action exists at all.
#[inline]
pub fn lookup(code: u8) -> Option<&'static ActionSpec> {
    match INDEX[code as usize] {
        NONE => None,
        i => ACTIONS.get(i as usize),
    }
}

/// Stack helpers shared by the handlers.
impl Context {
    #[inline]
    pub(crate) fn pop(&mut self) -> Value {
        self.stack.pop().unwrap_or_default()
    }

    #[inline]
    pub(crate) fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    pub(crate) fn pop_string(&mut self) -> StringId {
        let value = self.pop();
        self.to_string_id(value)
    }

    pub(crate) fn pop_number(&mut self) -> f64 {
        let value = self.pop();
        self.to_number(value)
    }

    pub(crate) fn pop_integer(&mut self) -> i32 {
        let value = self.pop();
        self.to_integer(value)
    }

    /// Values the current frame pushed and may still pop.
    pub(crate) fn operands_available(&self) -> usize {
        let base = self.frames.last().map_or(0, |f| f.stack_base);
        self.stack.len().saturating_sub(base)
    }

    /// Pops an argument count followed by that many arguments, first
    /// argument on top. The count is clamped to what the frame owns.
    pub(crate) fn pop_arguments(&mut self) -> Vec<Value> {
        let count = self.pop_integer().max(0) as usize;
        let available = self.operands_available();
        if count > available {
            log::debug!("argument count {count} exceeds the {available} values on the stack");
        }
        let mut args = self.stack.pop_n(count.min(available));
        args.reverse();
        args
    }

    /// Booleans were numbers before version 5.
    pub(crate) fn push_bool(&mut self, value: bool) {
        if self.version() >= 5 {
            self.push(Value::Boolean(value));
        } else {
            self.push(Value::Int(i32::from(value)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_codes_are_unique_and_indexed() {
        for (i, spec) in ACTIONS.iter().enumerate() {
            assert_eq!(INDEX[spec.code as usize] as usize, i, "{} is shadowed", spec.name);
            assert!(spec.since >= 1 && spec.since <= crate::action::MAX_VERSION);
        }
        assert!(lookup(0x00).is_none());
        assert_eq!(lookup(0x47).map(|s| s.name), Some("Add2"));
    }

    #[test]
    fn arguments_pop_first_argument_on_top() {
        let mut context = Context::startup(8);
        context.push(Value::Int(3));
        context.push(Value::Int(2));
        context.push(Value::Int(1));
        context.push(Value::Int(3));
        assert_eq!(
            context.pop_arguments(),
            vec![Value::Int(1), Value::Int(2), Value::Int(3)]
        );
    }
}
